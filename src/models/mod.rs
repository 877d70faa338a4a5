pub mod config;

pub use config::{AppConfig, PackageFormat, ReauthSettings, RepositoryConfig};
