// proxy module - CodeArtifact reverse proxy service

pub mod config;
pub mod credential_store;
pub mod request_context;
pub mod rewrite;
pub mod server;
pub mod token_manager;

pub mod handlers; // Catch-all registry handler
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

pub use config::ProxyConfig;
pub use credential_store::CredentialStore;
pub use server::AxumServer;
pub use token_manager::TokenManager;
