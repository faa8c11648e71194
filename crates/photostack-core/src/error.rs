//! Error types for the PhotoStack core.

/// Core error type for PhotoStack infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum PhotoStackError {
    /// A required configuration value is absent.
    #[error("missing configuration value: {0}")]
    MissingConfig(&'static str),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for PhotoStack operations.
pub type PhotoStackResult<T> = Result<T, PhotoStackError>;
