//! Error types for Reposter

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepostError>;

#[derive(Error, Debug)]
pub enum RepostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dedup store error: {0}")]
    Store(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Process-level failure outside any component, e.g. signal setup
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl RepostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RepostError::Config(_) => 2,
            RepostError::InvalidInput(_) => 3,
            RepostError::Store(_) => 1,
            RepostError::Platform(_) => 1,
            RepostError::Feed(_) => 1,
            RepostError::Runtime(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("History query failed: {0}")]
    History(#[from] PlatformError),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Not available: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("Feed authentication failed: {0}")]
    Authentication(String),

    #[error("Feed transport error: {0}")]
    Transport(String),

    #[error("Unexpected feed response: {0}")]
    Protocol(String),
}
