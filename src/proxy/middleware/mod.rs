// Middleware module - Axum middleware

pub mod context;

pub use context::capture_client_context;
