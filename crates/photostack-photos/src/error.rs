//! Photo pipeline error types.
//!
//! [`PhotoError`] is what callers of [`crate::PhotoLifecycleManager`] see.
//! [`ProcessingError`] describes why a single photo could not be turned into
//! variants; it never reaches the caller as an `Err` and is written into the
//! photo's slot as a `FAILED` status instead.

use photostack_store::StoreError;

use crate::codec::CodecError;

/// Coarse error category, for mapping onto a transport's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was rejected as a whole; nothing changed.
    Validation,
    /// The listing or photo does not exist.
    NotFound,
    /// The object store answered with an error.
    Storage,
    /// Anything else.
    Internal,
}

/// Errors returned by pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    /// Disallowed content type, oversized file, slot cap exceeded, malformed
    /// reorder, foreign staging key, photo not downloadable.
    #[error("{0}")]
    Validation(String),

    /// Unknown listing id.
    #[error("listing not found: {listing_id}")]
    ListingNotFound {
        /// The listing id that was not found.
        listing_id: String,
    },

    /// Unknown photo id within an existing listing.
    #[error("photo {photo_id} not found in listing {listing_id}")]
    PhotoNotFound {
        /// The listing that was searched.
        listing_id: String,
        /// The photo id that was not found.
        photo_id: String,
    },

    /// Non-success response from the object store.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PhotoError {
    /// Shorthand for [`PhotoError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::ListingNotFound { .. } | Self::PhotoNotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience result type for pipeline operations.
pub type PhotoResult<T> = Result<T, PhotoError>;

/// Why one staged upload could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// The staged object is gone or was never uploaded.
    #[error("staged upload not found: {key}")]
    StagedObjectMissing {
        /// The staging key.
        key: String,
    },

    /// The stored object is not an accepted image type.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// The stored object exceeds the upload cap.
    #[error("staged upload is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Actual size.
        size: u64,
        /// Configured cap.
        limit: u64,
    },

    /// Decoding or encoding failed.
    #[error("image could not be processed: {0}")]
    Codec(#[from] CodecError),

    /// Reading the source or writing a variant failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The transcode task did not complete.
    #[error("transcode task failed: {0}")]
    Task(String),
}
