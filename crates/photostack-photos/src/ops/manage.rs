//! Replace, delete and reorder.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use super::ingest::{PhotoOutcome, validate_staged_key};
use crate::cleanup::{Cleanup, CleanupWarning};
use crate::codec::ImageCodec;
use crate::error::{PhotoError, PhotoResult};
use crate::manager::PhotoLifecycleManager;
use crate::model::{Listing, PhotoSlot, PhotoStatus};

/// The result of `replace_photo`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    /// The listing after the slot was finalized.
    pub listing: Listing,
    /// How processing the new source ended.
    pub photo: PhotoOutcome,
}

/// The result of `delete_photo`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// The listing without the photo.
    pub listing: Listing,
    /// Every distinct variant key a delete was issued for.
    pub deleted_keys: Vec<String>,
    /// Deletes that did not go through.
    pub warnings: Vec<CleanupWarning>,
}

fn photo_not_found(listing_id: &str, photo_id: &str) -> PhotoError {
    PhotoError::PhotoNotFound {
        listing_id: listing_id.to_owned(),
        photo_id: photo_id.to_owned(),
    }
}

impl<C: ImageCodec> PhotoLifecycleManager<C> {
    /// Regenerate an existing photo from a new staged upload, keeping its id
    /// and position.
    ///
    /// The slot goes back to `PROCESSING` first. If the new source cannot be
    /// processed, or its result cannot be saved, the slot ends `FAILED` with
    /// its previous variants restored, so the listing keeps showing the old
    /// image.
    pub async fn replace_photo(
        &self,
        listing_id: &str,
        photo_id: &str,
        staged_key: &str,
    ) -> PhotoResult<ReplaceOutcome> {
        let key = validate_staged_key(listing_id, staged_key)?.to_owned();

        let (previous, _) = self
            .update_listing(listing_id, |listing| {
                let photo = listing
                    .photo_mut(photo_id)
                    .ok_or_else(|| photo_not_found(listing_id, photo_id))?;
                if photo.status == PhotoStatus::Processing {
                    return Err(PhotoError::validation(format!(
                        "photo {photo_id} is still processing"
                    )));
                }
                let previous = photo.clone();
                photo.mark_processing();
                Ok(previous)
            })
            .await?;
        info!(listing_id, photo_id, "replacing photo");

        let photo = self
            .process_staged_photo(listing_id, photo_id, &key, Some(&previous), true)
            .await;
        let listing = self.listings.get(listing_id).await?;
        Ok(ReplaceOutcome { listing, photo })
    }

    /// Remove a photo from the listing, then delete its variants.
    ///
    /// The listing is saved before any object is touched; a delete that fails
    /// afterwards leaves an orphan object and a warning, never a slot pointing
    /// at missing objects.
    pub async fn delete_photo(&self, listing_id: &str, photo_id: &str) -> PhotoResult<DeleteOutcome> {
        let (keys, listing) = self
            .update_listing(listing_id, |listing| {
                let index = listing
                    .position(photo_id)
                    .ok_or_else(|| photo_not_found(listing_id, photo_id))?;
                Ok(match listing.photos.remove(index) {
                    PhotoSlot::Optimized(photo) => photo.variant_keys(),
                    PhotoSlot::Legacy(_) => Vec::new(),
                })
            })
            .await?;

        let mut cleanup = Cleanup::new();
        cleanup.extend(keys.iter().cloned());
        let warnings = cleanup.run(self.objects.as_ref()).await;
        info!(
            listing_id,
            photo_id,
            keys = keys.len(),
            failed = warnings.len(),
            "deleted photo"
        );

        Ok(DeleteOutcome {
            listing,
            deleted_keys: keys,
            warnings,
        })
    }

    /// Put the optimized photos in `desired_ids` order.
    ///
    /// `desired_ids` must name every optimized photo exactly once. Legacy
    /// assets keep their relative order and move behind the optimized photos.
    pub async fn reorder_photos(
        &self,
        listing_id: &str,
        desired_ids: &[String],
    ) -> PhotoResult<Listing> {
        let (_, listing) = self
            .update_listing(listing_id, |listing| {
                let current: HashSet<String> = listing.optimized_ids().into_iter().collect();
                let mut seen = HashSet::with_capacity(desired_ids.len());
                for id in desired_ids {
                    if !seen.insert(id.as_str()) {
                        return Err(PhotoError::validation(format!("duplicate photo id: {id}")));
                    }
                    if !current.contains(id) {
                        return Err(PhotoError::validation(format!(
                            "photo {id} is not in listing {listing_id}"
                        )));
                    }
                }
                if seen.len() != current.len() {
                    return Err(PhotoError::validation(format!(
                        "expected {} photo ids, got {}",
                        current.len(),
                        seen.len()
                    )));
                }

                let mut optimized = HashMap::with_capacity(current.len());
                let mut legacy = Vec::new();
                for slot in listing.photos.drain(..) {
                    match slot {
                        PhotoSlot::Optimized(photo) => {
                            optimized.insert(photo.id.clone(), PhotoSlot::Optimized(photo));
                        }
                        slot @ PhotoSlot::Legacy(_) => legacy.push(slot),
                    }
                }
                listing.photos = desired_ids
                    .iter()
                    .filter_map(|id| optimized.remove(id))
                    .chain(legacy)
                    .collect();
                Ok(())
            })
            .await?;

        info!(listing_id, count = desired_ids.len(), "reordered photos");
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::test_support::{Fixture, LISTING_ID};
    use crate::model::{OptimizedPhoto, Variant, VariantFormat, VariantKind};
    use crate::ops::ingest::ProcessResult;

    #[tokio::test]
    async fn test_should_replace_photo_and_drop_old_variants() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let old_keys = fixture.listing().photo(&photo_id).unwrap().variant_keys();
        let staged = fixture.stage("b");

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert_eq!(outcome.photo.result, ProcessResult::Ready { variant_count: 10 });
        assert_eq!(outcome.listing.position(&photo_id), Some(0));
        let photo = outcome.listing.photo(&photo_id).unwrap();
        assert_eq!(photo.status, PhotoStatus::Ready);
        for key in &old_keys {
            assert!(!fixture.objects.contains(key));
            assert!(!photo.variant_keys().contains(key));
        }
        for key in photo.variant_keys() {
            assert!(fixture.objects.contains(&key));
        }
        assert!(!fixture.objects.contains(&staged));
    }

    #[tokio::test]
    async fn test_should_keep_previous_variants_when_replace_fails() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let before = fixture.listing().photo(&photo_id).unwrap().clone();
        let staged = fixture.stage_bytes(b"corrupt", "image/jpeg");

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert!(matches!(outcome.photo.result, ProcessResult::Failed { .. }));
        let photo = outcome.listing.photo(&photo_id).unwrap();
        assert_eq!(photo.status, PhotoStatus::Failed);
        assert_eq!(photo.variants, before.variants);
        assert_eq!(photo.width, before.width);
        for key in before.variant_keys() {
            assert!(fixture.objects.contains(&key));
        }
    }

    #[tokio::test]
    async fn test_should_mark_slot_processing_while_replacing() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let saves_before = fixture.listings.save_count();
        let staged = fixture.stage("b");

        fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        let marked = &fixture.listings.saved()[saves_before];
        let photo = marked.photo(&photo_id).unwrap();
        assert_eq!(photo.status, PhotoStatus::Processing);
        assert!(photo.variants.is_empty());
    }

    #[tokio::test]
    async fn test_should_not_delete_reused_keys_on_identical_replace() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let keys = fixture.listing().photo(&photo_id).unwrap().variant_keys();
        let staged = fixture.stage("a");

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert_eq!(outcome.listing.photo(&photo_id).unwrap().variant_keys(), keys);
        for key in &keys {
            assert!(fixture.objects.contains(key));
        }
    }

    #[tokio::test]
    async fn test_should_not_roll_back_restored_keys_on_identical_failed_replace() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let keys = fixture.listing().photo(&photo_id).unwrap().variant_keys();
        let staged = fixture.stage("a");
        fixture.objects.fail_puts_after(3);

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert!(matches!(outcome.photo.result, ProcessResult::Failed { .. }));
        for key in &keys {
            assert!(fixture.objects.contains(key), "{key} was deleted");
        }
    }

    #[tokio::test]
    async fn test_should_restore_previous_variants_when_failure_save_is_retried() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let before = fixture.listing().photo(&photo_id).unwrap().clone();
        let staged = fixture.stage_bytes(b"corrupt", "image/jpeg");
        // Marking the slot PROCESSING goes through; the FAILED record does not.
        fixture.listings.fail_saves_after(1, 1);

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert!(matches!(
            outcome.photo.result,
            ProcessResult::Failed { ref error } if error.contains("decode failed")
        ));
        let photo = outcome.listing.photo(&photo_id).unwrap();
        assert_eq!(photo.status, PhotoStatus::Failed);
        assert_eq!(photo.variants, before.variants);
        for key in before.variant_keys() {
            assert!(fixture.objects.contains(&key));
        }
        assert!(!fixture.objects.contains(&staged));
    }

    #[tokio::test]
    async fn test_should_keep_previous_photo_when_ready_result_cannot_be_saved() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let before = fixture.listing().photo(&photo_id).unwrap().clone();
        let staged = fixture.stage("b");
        fixture.listings.fail_saves_after(1, 1);

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert!(matches!(
            outcome.photo.result,
            ProcessResult::Failed { ref error } if error.contains("could not record result")
        ));
        let photo = outcome.listing.photo(&photo_id).unwrap();
        assert_eq!(photo.variants, before.variants);
        let stored = fixture.objects.keys_with_prefix("listings/42/photos/");
        assert_eq!(stored.len(), 10);
        for key in before.variant_keys() {
            assert!(stored.contains(&key));
        }
    }

    #[tokio::test]
    async fn test_should_report_unrecorded_replace_and_keep_previous_objects() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let before = fixture.listing().photo(&photo_id).unwrap().clone();
        let staged = fixture.stage("b");
        fixture.listings.fail_saves_after(1, usize::MAX);

        let outcome = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, &staged)
            .await
            .unwrap();

        assert!(matches!(outcome.photo.result, ProcessResult::Unrecorded { .. }));
        assert_eq!(
            outcome.listing.photo(&photo_id).unwrap().status,
            PhotoStatus::Processing
        );
        assert_eq!(
            fixture.objects.keys_with_prefix("listings/42/photos/").len(),
            before.variant_keys().len()
        );
        assert!(!fixture.objects.contains(&staged));
    }

    #[tokio::test]
    async fn test_should_reject_replace_of_processing_photo() {
        let fixture = Fixture::new();
        let mut listing = fixture.listing();
        listing
            .photos
            .push(PhotoSlot::Optimized(OptimizedPhoto::processing("p1")));
        fixture.listings.insert(listing);
        let staged = fixture.stage("a");

        let err = fixture
            .manager
            .replace_photo(LISTING_ID, "p1", &staged)
            .await
            .unwrap_err();

        assert!(matches!(err, PhotoError::Validation(_)));
        assert!(fixture.objects.contains(&staged));
    }

    #[tokio::test]
    async fn test_should_reject_replace_with_foreign_staging_key() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;

        let err = fixture
            .manager
            .replace_photo(LISTING_ID, &photo_id, "listings/7/staging/abc")
            .await
            .unwrap_err();

        assert!(matches!(err, PhotoError::Validation(_)));
        assert!(fixture.listing().photo(&photo_id).unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_should_fail_replace_of_unknown_photo() {
        let fixture = Fixture::new();
        let staged = fixture.stage("a");
        let err = fixture
            .manager
            .replace_photo(LISTING_ID, "nope", &staged)
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::PhotoNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_delete_photo_and_its_variants() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let keep_id = fixture.ingest_one("b").await;

        let outcome = fixture
            .manager
            .delete_photo(LISTING_ID, &photo_id)
            .await
            .unwrap();

        assert_eq!(outcome.deleted_keys.len(), 10);
        assert!(outcome.warnings.is_empty());
        assert!(outcome.listing.photo(&photo_id).is_none());
        assert_eq!(outcome.listing.optimized_ids(), vec![keep_id]);
        for key in &outcome.deleted_keys {
            assert!(!fixture.objects.contains(key));
        }
        assert_eq!(fixture.objects.keys_with_prefix("listings/42/photos/").len(), 10);
    }

    #[tokio::test]
    async fn test_should_issue_one_delete_per_distinct_key() {
        let fixture = Fixture::new();
        let shared = |format| Variant {
            storage_key: "listings/42/photos/v1/abc/640.webp".to_owned(),
            width: 640,
            format,
            kind: VariantKind::Responsive,
            byte_size: 3,
        };
        let mut photo = OptimizedPhoto::processing("p1");
        photo.mark_ready(640, 480, vec![shared(VariantFormat::Webp), shared(VariantFormat::Webp)]);
        let mut listing = fixture.listing();
        listing.photos.push(PhotoSlot::Optimized(photo));
        fixture.listings.insert(listing);

        fixture.manager.delete_photo(LISTING_ID, "p1").await.unwrap();

        assert_eq!(
            fixture.objects.deleted_keys(),
            vec!["listings/42/photos/v1/abc/640.webp".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_should_report_failed_variant_delete_as_warning() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let keys = fixture.listing().photo(&photo_id).unwrap().variant_keys();
        fixture.objects.fail_deletes_of(&keys[0]);

        let outcome = fixture
            .manager
            .delete_photo(LISTING_ID, &photo_id)
            .await
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].key, keys[0]);
        assert!(fixture.listing().photos.is_empty());
        assert!(!fixture.objects.contains(&keys[1]));
    }

    #[tokio::test]
    async fn test_should_fail_delete_of_unknown_photo() {
        let fixture = Fixture::new();
        let err = fixture
            .manager
            .delete_photo(LISTING_ID, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::PhotoNotFound { .. }));
        assert_eq!(fixture.listings.save_count(), 0);
    }

    #[tokio::test]
    async fn test_should_reorder_and_move_legacy_assets_last() {
        let fixture = Fixture::new();
        fixture.add_legacy("https://cdn.example.com/old.jpg");
        let a = fixture.ingest_one("a").await;
        let b = fixture.ingest_one("b").await;
        let c = fixture.ingest_one("c").await;

        let listing = fixture
            .manager
            .reorder_photos(LISTING_ID, &[c.clone(), a.clone(), b.clone()])
            .await
            .unwrap();

        assert_eq!(listing.optimized_ids(), vec![c, a, b]);
        assert_eq!(listing.photos.len(), 4);
        assert!(matches!(listing.photos[3], PhotoSlot::Legacy(_)));
        assert_eq!(fixture.listing(), listing);
    }

    #[tokio::test]
    async fn test_should_reject_malformed_reorder() {
        let fixture = Fixture::new();
        let a = fixture.ingest_one("a").await;
        let b = fixture.ingest_one("b").await;
        let before = fixture.listing();
        let saves = fixture.listings.save_count();

        for desired in [
            vec![a.clone()],
            vec![a.clone(), b.clone(), "extra".to_owned()],
            vec![a.clone(), a.clone()],
            vec![a.clone(), "other".to_owned()],
        ] {
            let err = fixture
                .manager
                .reorder_photos(LISTING_ID, &desired)
                .await
                .unwrap_err();
            assert!(matches!(err, PhotoError::Validation(_)), "{desired:?}");
        }
        assert_eq!(fixture.listing(), before);
        assert_eq!(fixture.listings.save_count(), saves);
    }
}
