//! In-memory [`ObjectStore`] backend.
//!
//! [`InMemoryObjectStore`] keeps every object as [`Bytes`] in a [`DashMap`]
//! keyed by object key. It follows S3 semantics where the pipeline depends on
//! them (a missing key is a 404, deleting a missing key succeeds) and adds a
//! few hooks for tests: a log of every delete issued, and failure injection
//! for puts and for deletes of specific keys.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::{ObjectHead, ObjectStore, PutOptions, normalize_key};

// ---------------------------------------------------------------------------
// StoredObject
// ---------------------------------------------------------------------------

/// An object body and the headers it was written with.
#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    cache_control: Option<String>,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("size", &self.data.len())
            .field("content_type", &self.content_type)
            .field("cache_control", &self.cache_control)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InMemoryObjectStore
// ---------------------------------------------------------------------------

/// Thread-safe in-memory object store.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use photostack_store::{InMemoryObjectStore, ObjectStore, PutOptions};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryObjectStore::new();
/// store
///     .put("listings/1/a.webp", Bytes::from_static(b"img"), &PutOptions::new("image/webp"))
///     .await
///     .unwrap();
/// assert_eq!(store.head("listings/1/a.webp").await.unwrap().content_length, 3);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, StoredObject>,
    /// Every key passed to `delete`, in call order.
    deletes: Mutex<Vec<String>>,
    /// Number of further puts that succeed before every put fails.
    put_budget: Mutex<Option<usize>>,
    /// Keys whose deletes fail.
    failing_deletes: Mutex<HashSet<String>>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, as a client uploading through a presigned
    /// URL would.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: Option<&str>) {
        self.objects.insert(
            normalize_key(key).to_owned(),
            StoredObject {
                data: data.into(),
                content_type: content_type.map(str::to_owned),
                cache_control: None,
            },
        );
    }

    /// Whether `key` exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(normalize_key(key))
    }

    /// The body stored under `key`.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects
            .get(normalize_key(key))
            .map(|entry| entry.data.clone())
    }

    /// The `Cache-Control` value `key` was written with.
    #[must_use]
    pub fn cache_control(&self, key: &str) -> Option<String> {
        self.objects
            .get(normalize_key(key))
            .and_then(|entry| entry.cache_control.clone())
    }

    /// All stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    /// Stored keys under `prefix`, sorted.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every key `delete` has been called with, in call order.
    #[must_use]
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().clone()
    }

    /// Let the next `n` puts succeed and fail every put after them with a 500.
    pub fn fail_puts_after(&self, n: usize) {
        *self.put_budget.lock() = Some(n);
    }

    /// Make deletes of `key` fail with a 500.
    pub fn fail_deletes_of(&self, key: &str) {
        self.failing_deletes
            .lock()
            .insert(normalize_key(key).to_owned());
    }

    /// Remove all objects, recorded deletes, and injected failures.
    pub fn reset(&self) {
        self.objects.clear();
        self.deletes.lock().clear();
        *self.put_budget.lock() = None;
        self.failing_deletes.lock().clear();
        debug!("reset in-memory object store");
    }

    fn injected_failure(key: &str, operation: &str) -> StoreError {
        StoreError::Status {
            status: 500,
            key: key.to_owned(),
            message: format!("injected {operation} failure"),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let key = normalize_key(key);
        self.objects
            .get(key)
            .map(|entry| ObjectHead {
                content_type: entry.content_type.clone(),
                content_length: entry.data.len() as u64,
            })
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let key = normalize_key(key);
        self.object(key).ok_or_else(|| StoreError::not_found(key))
    }

    async fn put(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StoreError> {
        let key = normalize_key(key);
        {
            let mut budget = self.put_budget.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(Self::injected_failure(key, "put"));
                }
                *remaining -= 1;
            }
        }

        trace!(key, size = body.len(), "stored object");
        self.objects.insert(
            key.to_owned(),
            StoredObject {
                data: body,
                content_type: Some(options.content_type.clone()),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = normalize_key(key);
        self.deletes.lock().push(key.to_owned());
        if self.failing_deletes.lock().contains(key) {
            return Err(Self::injected_failure(key, "delete"));
        }
        self.objects.remove(key);
        Ok(())
    }

    fn presign_upload(&self, key: &str, expires_secs: u64) -> Result<String, StoreError> {
        Ok(format!(
            "memory:///{}?method=PUT&expires={expires_secs}",
            normalize_key(key)
        ))
    }

    fn presign_download(
        &self,
        key: &str,
        expires_secs: u64,
        filename: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut url = format!(
            "memory:///{}?method=GET&expires={expires_secs}",
            normalize_key(key)
        );
        if let Some(filename) = filename {
            url.push_str("&filename=");
            url.push_str(filename);
        }
        Ok(url)
    }
}
