use thiserror::Error;

/// Main error type for the threshold logger
#[derive(Error, Debug)]
pub enum LoggerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Log store errors
    #[error("Failed to open log store: {0}")]
    StoreOpen(String),

    #[error("Log store write failed: {0}")]
    StoreWrite(String),

    #[error("Unexpected store response: {0}")]
    StoreResponse(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    /// Whether this error prevents logging from starting at all:
    /// bad configuration, or a store that cannot be opened.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            LoggerError::Config(_)
                | LoggerError::InvalidConfig(_)
                | LoggerError::StoreOpen(_)
                | LoggerError::Auth(_)
        )
    }
}

/// Result type alias for LoggerError
pub type Result<T> = std::result::Result<T, LoggerError>;
