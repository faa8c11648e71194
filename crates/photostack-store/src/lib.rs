//! Object store access for PhotoStack.
//!
//! The [`ObjectStore`] trait is the seam between the photo pipeline and the
//! bytes it reads and writes. Two implementations are provided:
//!
//! - [`S3ObjectStore`] talks to any S3-compatible endpoint over HTTP, signing
//!   every request with SigV4 and minting presigned upload/download URLs.
//! - [`InMemoryObjectStore`] keeps objects in a [`dashmap::DashMap`] and is
//!   used by tests and local demos.
//!
//! Keys are always relative (`listings/42/staging/...`) and joined under the
//! single bucket the store was configured with.

pub mod error;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::StoreError;
pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    /// The stored `Content-Type`, if any.
    pub content_type: Option<String>,
    /// Object size in bytes.
    pub content_length: u64,
}

/// Headers attached to an uploaded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// `Content-Type` of the body.
    pub content_type: String,
    /// Optional `Cache-Control` value.
    pub cache_control: Option<String>,
}

impl PutOptions {
    /// Options with only a content type.
    #[must_use]
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: None,
        }
    }

    /// Attach a `Cache-Control` value.
    #[must_use]
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }
}

/// Operations the photo pipeline needs from an object store.
///
/// Implementations perform no retries. Deleting a key that does not exist
/// succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetch object metadata.
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError>;

    /// Fetch the full object body.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Upload an object, replacing any existing one.
    async fn put(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StoreError>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Mint a URL a client can `PUT` the object body to.
    fn presign_upload(&self, key: &str, expires_secs: u64) -> Result<String, StoreError>;

    /// Mint a URL a client can `GET` the object from.
    ///
    /// When `filename` is given the response is served as an attachment under
    /// that name.
    fn presign_download(
        &self,
        key: &str,
        expires_secs: u64,
        filename: Option<&str>,
    ) -> Result<String, StoreError>;
}

/// Build a `Content-Disposition: attachment` value for a download.
///
/// Quotes and backslashes are dropped from the name so the header stays a
/// single well-formed quoted string.
///
/// # Examples
///
/// ```
/// use photostack_store::attachment_disposition;
///
/// assert_eq!(
///     attachment_disposition("casa-photo-01.webp"),
///     "attachment; filename=\"casa-photo-01.webp\""
/// );
/// ```
#[must_use]
pub fn attachment_disposition(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{cleaned}\"")
}

/// Strip any leading separators from a key.
pub(crate) fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}
