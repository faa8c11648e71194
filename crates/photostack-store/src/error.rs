//! Object store error types.

use photostack_auth::AuthError;

/// Errors produced by an [`crate::ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("object store returned {status} for {key}: {message}")]
    Status {
        /// Upstream HTTP status code.
        status: u16,
        /// The key the request addressed.
        key: String,
        /// Response body or reason phrase.
        message: String,
    },

    /// The request never produced a response.
    #[error("object store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store could not be constructed from its configuration.
    #[error("invalid object store configuration: {0}")]
    Config(String),

    /// Signer construction failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl StoreError {
    /// A `404 Not Found` for `key`.
    #[must_use]
    pub fn not_found(key: &str) -> Self {
        Self::Status {
            status: 404,
            key: key.to_owned(),
            message: "The specified key does not exist.".to_owned(),
        }
    }

    /// The upstream status, when the store answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the store reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
