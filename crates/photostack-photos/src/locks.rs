//! Per-listing serialization of read-modify-write sections.
//!
//! Every mutation of a listing's photo sequence reads the whole record,
//! changes it and saves it back. Holding the listing's lock across that
//! sequence means two operations on the same listing in this process cannot
//! overwrite each other's changes. Transcoding and uploads happen outside the
//! lock. Processes sharing one listing store are not coordinated.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutexes, one per listing id.
#[derive(Debug, Default)]
pub struct ListingLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ListingLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `listing_id`.
    pub async fn lock(&self, listing_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so no map shard stays locked across the await.
        let lock = Arc::clone(self.locks.entry(listing_id.to_owned()).or_default().value());
        lock.lock_owned().await
    }

    /// Number of listings that have been locked at least once.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
