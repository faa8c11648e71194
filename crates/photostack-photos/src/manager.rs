//! The photo lifecycle manager.
//!
//! [`PhotoLifecycleManager`] owns the collaborators every photo operation
//! needs (object store, listing store, image codec, configuration) and the
//! per-listing lock table. The operations themselves are implemented in the
//! [`crate::ops`] submodules as further `impl` blocks on this type.

use std::fmt;
use std::sync::Arc;

use photostack_store::ObjectStore;

use crate::codec::{ImageCodec, RustImageCodec};
use crate::config::PhotoConfig;
use crate::error::PhotoResult;
use crate::listing_store::ListingStore;
use crate::locks::ListingLocks;
use crate::model::Listing;

/// Orchestrates upload slots, ingestion, replacement, deletion, reordering
/// and export of listing photos.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use photostack_photos::{InMemoryListingStore, PhotoConfig, PhotoLifecycleManager};
/// use photostack_store::InMemoryObjectStore;
///
/// let manager = PhotoLifecycleManager::with_default_codec(
///     PhotoConfig::default(),
///     Arc::new(InMemoryObjectStore::new()),
///     Arc::new(InMemoryListingStore::new()),
/// );
/// assert_eq!(manager.config().max_photos, 40);
/// ```
pub struct PhotoLifecycleManager<C: ImageCodec = RustImageCodec> {
    pub(crate) config: Arc<PhotoConfig>,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) listings: Arc<dyn ListingStore>,
    pub(crate) codec: Arc<C>,
    pub(crate) locks: ListingLocks,
}

impl<C: ImageCodec> fmt::Debug for PhotoLifecycleManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoLifecycleManager")
            .field("config", &self.config)
            .field("objects", &self.objects)
            .field("listings", &self.listings)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl<C: ImageCodec> PhotoLifecycleManager<C> {
    /// Create a manager with an explicit codec.
    pub fn new(
        config: PhotoConfig,
        objects: Arc<dyn ObjectStore>,
        listings: Arc<dyn ListingStore>,
        codec: C,
    ) -> Self {
        Self {
            config: Arc::new(config),
            objects,
            listings,
            codec: Arc::new(codec),
            locks: ListingLocks::new(),
        }
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PhotoConfig {
        &self.config
    }

    /// The object store variants and staged uploads live in.
    #[must_use]
    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    /// The listing store.
    #[must_use]
    pub fn listings(&self) -> &dyn ListingStore {
        self.listings.as_ref()
    }

    /// Run `change` against the current record of `listing_id` under the
    /// listing's lock and persist the result.
    ///
    /// When `change` fails nothing is saved and the error is returned.
    pub(crate) async fn update_listing<T>(
        &self,
        listing_id: &str,
        change: impl FnOnce(&mut Listing) -> PhotoResult<T> + Send,
    ) -> PhotoResult<(T, Listing)> {
        let _guard = self.locks.lock(listing_id).await;
        let mut listing = self.listings.get(listing_id).await?;
        let value = change(&mut listing)?;
        let saved = self.listings.save(listing).await?;
        Ok((value, saved))
    }
}

impl PhotoLifecycleManager<RustImageCodec> {
    /// Create a manager using [`RustImageCodec`] configured from `config`.
    pub fn with_default_codec(
        config: PhotoConfig,
        objects: Arc<dyn ObjectStore>,
        listings: Arc<dyn ListingStore>,
    ) -> Self {
        let codec = RustImageCodec::from_config(&config);
        Self::new(config, objects, listings, codec)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;

    #[test]
    fn test_should_debug_format_manager() {
        let fixture = Fixture::new();
        let debug = format!("{:?}", fixture.manager);
        assert!(debug.contains("PhotoLifecycleManager"));
        assert!(debug.contains("MockCodec"));
    }

    #[tokio::test]
    async fn test_should_not_save_when_change_fails() {
        let fixture = Fixture::new();
        let result = fixture
            .manager
            .update_listing(super::test_support::LISTING_ID, |_| {
                Err::<(), _>(crate::PhotoError::validation("nope"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(fixture.listings.save_count(), 0);
    }
}
