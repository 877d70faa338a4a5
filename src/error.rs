use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization token request failed: {0}")]
    Auth(String),

    #[error("Repository endpoint lookup failed: {0}")]
    Endpoint(String),

    #[error("{operation} did not complete within {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Authorization token is {age_minutes} minutes old and can no longer be trusted")]
    CredentialExpired { age_minutes: i64 },
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;
