//! The listing persistence collaborator.
//!
//! The pipeline needs exactly two things from wherever listings live: load a
//! whole record and save a whole record. [`InMemoryListingStore`] implements
//! both over a [`DashMap`] and keeps every saved snapshot, which lets tests
//! observe intermediate states such as freshly persisted placeholders. Saves
//! can be made to fail to exercise outages of the real store.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{PhotoError, PhotoResult};
use crate::model::Listing;

/// Load and save listing records.
#[async_trait]
pub trait ListingStore: Send + Sync + std::fmt::Debug {
    /// Load a listing, failing with [`PhotoError::ListingNotFound`].
    async fn get(&self, listing_id: &str) -> PhotoResult<Listing>;

    /// Persist a whole listing and return what was stored.
    async fn save(&self, listing: Listing) -> PhotoResult<Listing>;
}

/// Thread-safe in-memory [`ListingStore`].
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    listings: DashMap<String, Listing>,
    /// Every listing passed to `save`, in call order.
    history: Mutex<Vec<Listing>>,
    /// Saves still to let through, then saves to fail.
    save_failures: Mutex<Option<(usize, usize)>>,
}

impl InMemoryListingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a listing without recording a save.
    pub fn insert(&self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    /// The current record for `listing_id`.
    #[must_use]
    pub fn snapshot(&self, listing_id: &str) -> Option<Listing> {
        self.listings.get(listing_id).map(|l| l.value().clone())
    }

    /// Every saved record, oldest first.
    #[must_use]
    pub fn saved(&self) -> Vec<Listing> {
        self.history.lock().clone()
    }

    /// Number of saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.history.lock().len()
    }

    /// Drop a listing, as if it were deleted elsewhere.
    pub fn remove(&self, listing_id: &str) -> Option<Listing> {
        self.listings.remove(listing_id).map(|(_, l)| l)
    }

    /// Let the next `skip` saves through, then fail the following `count`.
    pub fn fail_saves_after(&self, skip: usize, count: usize) {
        *self.save_failures.lock() = Some((skip, count));
    }

    fn take_save_failure(&self) -> bool {
        let mut failures = self.save_failures.lock();
        match failures.as_mut() {
            None | Some((0, 0)) => false,
            Some((0, count)) => {
                *count -= 1;
                true
            }
            Some((skip, _)) => {
                *skip -= 1;
                false
            }
        }
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn get(&self, listing_id: &str) -> PhotoResult<Listing> {
        self.snapshot(listing_id)
            .ok_or_else(|| PhotoError::ListingNotFound {
                listing_id: listing_id.to_owned(),
            })
    }

    async fn save(&self, listing: Listing) -> PhotoResult<Listing> {
        if self.take_save_failure() {
            return Err(PhotoError::Internal(anyhow::anyhow!(
                "listing store unavailable while saving {}",
                listing.id
            )));
        }
        trace!(listing_id = %listing.id, slots = listing.photos.len(), "saving listing");
        self.history.lock().push(listing.clone());
        self.listings.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }
}
