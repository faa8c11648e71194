//! Ingestion of staged uploads.
//!
//! `ingest_staged` persists one `PROCESSING` placeholder per staged key
//! before any image work starts, then processes the keys one at a time.
//! Processing a key:
//!
//! 1. HEAD the staged object and re-check its type and size.
//! 2. GET it and transcode on a blocking thread.
//! 3. Upload every variant under its content-addressed key.
//! 4. Finalize the slot as `READY` or `FAILED` under the listing lock.
//! 5. Delete the staged object, plus whatever the outcome made obsolete.
//!
//! A failed photo does not fail the call; it is recorded in its slot. Neither
//! does a listing store error while finalizing one photo: the slot falls back
//! to `FAILED` and the remaining photos are still processed.

use std::collections::HashSet;
use std::sync::Arc;

use photostack_store::{PutOptions, StoreError};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cleanup::{Cleanup, CleanupWarning};
use crate::codec::ImageCodec;
use crate::error::{PhotoError, PhotoResult, ProcessingError};
use crate::keys::{VARIANT_CACHE_CONTROL, is_staging_key_for};
use crate::manager::PhotoLifecycleManager;
use crate::model::{Listing, OptimizedPhoto, PhotoSlot, Variant};
use crate::transcode::{VariantPlan, transcode};
use crate::validation::{check_capacity, is_allowed_content_type};

/// How processing one photo ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ProcessResult {
    /// The slot is `READY`.
    Ready {
        /// Number of variants stored.
        variant_count: usize,
    },
    /// The slot is `FAILED`.
    Failed {
        /// The message recorded on the slot.
        error: String,
    },
    /// The slot disappeared while processing; this attempt's uploads were
    /// rolled back.
    SlotRemoved,
    /// The listing store refused both the outcome and the fallback `FAILED`
    /// record, so the slot still reads `PROCESSING`. This attempt's uploads
    /// were rolled back and the objects of any previous version kept.
    Unrecorded {
        /// What went wrong, including the store error.
        error: String,
    },
}

/// The result of processing one staged upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoOutcome {
    /// The photo slot that was processed.
    pub photo_id: String,
    /// The staged key it was processed from.
    pub staged_key: String,
    /// How it ended.
    pub result: ProcessResult,
    /// Deletes that did not go through.
    pub warnings: Vec<CleanupWarning>,
}

/// The result of `ingest_staged`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// The listing after every photo was finalized.
    pub listing: Listing,
    /// One entry per staged key, in request order.
    pub photos: Vec<PhotoOutcome>,
}

impl IngestOutcome {
    /// All cleanup warnings across photos.
    pub fn warnings(&self) -> impl Iterator<Item = &CleanupWarning> {
        self.photos.iter().flat_map(|p| p.warnings.iter())
    }
}

/// Variants that made it into the store.
#[derive(Debug)]
struct Generated {
    width: u32,
    height: u32,
    variants: Vec<Variant>,
}

/// What the listing store ended up holding for one photo.
#[derive(Debug)]
enum Recorded {
    Ready(Generated),
    Failed(String),
    SlotRemoved,
    Unrecorded(String),
}

/// This attempt's uploads, minus keys the restored variants still reference.
/// Identical content maps onto identical keys.
fn rollback_keys(uploaded: Vec<String>, keep: Option<&OptimizedPhoto>) -> Vec<String> {
    let kept: HashSet<String> = keep
        .map(|p| p.variant_keys().into_iter().collect())
        .unwrap_or_default();
    uploaded.into_iter().filter(|k| !kept.contains(k)).collect()
}

/// Normalize staged keys. Rejects an empty list and duplicate or foreign
/// keys.
pub(crate) fn validate_staged_keys(listing_id: &str, keys: &[String]) -> PhotoResult<Vec<String>> {
    if keys.is_empty() {
        return Err(PhotoError::validation("no staged keys given"));
    }

    let mut seen = HashSet::with_capacity(keys.len());
    let mut normalized = Vec::with_capacity(keys.len());
    for key in keys {
        let key = validate_staged_key(listing_id, key)?;
        if !seen.insert(key) {
            return Err(PhotoError::validation(format!("duplicate staged key: {key}")));
        }
        normalized.push(key.to_owned());
    }
    Ok(normalized)
}

pub(crate) fn validate_staged_key<'a>(listing_id: &str, key: &'a str) -> PhotoResult<&'a str> {
    let key = key.trim_start_matches('/');
    if is_staging_key_for(listing_id, key) {
        Ok(key)
    } else {
        Err(PhotoError::validation(format!(
            "{key} is not a staged upload for listing {listing_id}"
        )))
    }
}

fn staged_read_error(key: &str, error: StoreError) -> ProcessingError {
    if error.is_not_found() {
        ProcessingError::StagedObjectMissing {
            key: key.to_owned(),
        }
    } else {
        ProcessingError::Storage(error)
    }
}

impl<C: ImageCodec> PhotoLifecycleManager<C> {
    /// Turn staged uploads into optimized photos.
    ///
    /// Fails only for invalid requests (no keys, duplicate or foreign keys,
    /// slot limit) or when the listing store cannot load the listing or save
    /// the placeholders. Photos that cannot be processed or recorded are
    /// reported in the outcome.
    pub async fn ingest_staged(
        &self,
        listing_id: &str,
        staged_keys: &[String],
    ) -> PhotoResult<IngestOutcome> {
        let keys = validate_staged_keys(listing_id, staged_keys)?;

        let (photo_ids, _) = self
            .update_listing(listing_id, |listing| {
                check_capacity(&self.config, listing.photos.len(), keys.len())
                    .map_err(PhotoError::Validation)?;
                let ids: Vec<String> = keys
                    .iter()
                    .map(|_| uuid::Uuid::new_v4().to_string())
                    .collect();
                listing.photos.extend(
                    ids.iter()
                        .map(|id| PhotoSlot::Optimized(OptimizedPhoto::processing(id.clone()))),
                );
                Ok(ids)
            })
            .await?;
        info!(listing_id, count = photo_ids.len(), "persisted processing placeholders");

        let mut photos = Vec::with_capacity(keys.len());
        for (photo_id, key) in photo_ids.iter().zip(&keys) {
            photos.push(
                self.process_staged_photo(listing_id, photo_id, key, None, false)
                    .await,
            );
        }

        let listing = self.listings.get(listing_id).await?;
        Ok(IngestOutcome { listing, photos })
    }

    /// Process one staged upload into the slot `photo_id`.
    ///
    /// `previous` is the photo as it was before a replace. On success its
    /// variant keys that the new version does not reuse are deleted. On
    /// failure with `failure_keeps_variants` its variants are restored onto
    /// the slot and its objects are left alone.
    ///
    /// When the outcome cannot be saved, saving the slot as `FAILED` is tried
    /// once more before giving up with [`ProcessResult::Unrecorded`].
    pub(crate) async fn process_staged_photo(
        &self,
        listing_id: &str,
        photo_id: &str,
        staged_key: &str,
        previous: Option<&OptimizedPhoto>,
        failure_keeps_variants: bool,
    ) -> PhotoOutcome {
        let mut uploaded = Vec::new();
        let attempt = self
            .generate_variants(listing_id, staged_key, &mut uploaded)
            .await;
        let keep = previous.filter(|_| failure_keeps_variants);

        let first = match &attempt {
            Ok(generated) => {
                self.finalize(listing_id, photo_id, |photo| {
                    photo.mark_ready(generated.width, generated.height, generated.variants.clone());
                })
                .await
            }
            Err(error) => {
                self.finalize(listing_id, photo_id, |photo| {
                    photo.mark_failed(error.to_string(), keep);
                })
                .await
            }
        };

        let recorded = match (first, attempt) {
            (Ok(false), _) => Recorded::SlotRemoved,
            (Ok(true), Ok(generated)) => Recorded::Ready(generated),
            (Ok(true), Err(error)) => Recorded::Failed(error.to_string()),
            (Err(save_error), attempt) => {
                warn!(listing_id, photo_id, error = %save_error, "could not record photo outcome");
                let message = match attempt {
                    Ok(_) => format!("could not record result: {save_error}"),
                    Err(error) => error.to_string(),
                };
                match self
                    .finalize(listing_id, photo_id, |photo| {
                        photo.mark_failed(message.clone(), keep);
                    })
                    .await
                {
                    Ok(true) => Recorded::Failed(message),
                    Ok(false) => Recorded::SlotRemoved,
                    Err(retry_error) => Recorded::Unrecorded(format!(
                        "{message}; could not record failure: {retry_error}"
                    )),
                }
            }
        };

        let mut cleanup = Cleanup::new();
        cleanup.push(staged_key);

        let result = match recorded {
            Recorded::SlotRemoved => {
                cleanup.extend(uploaded);
                if let Some(previous) = previous {
                    cleanup.extend(previous.variant_keys());
                }
                warn!(listing_id, photo_id, "photo slot removed while processing");
                ProcessResult::SlotRemoved
            }
            Recorded::Ready(generated) => {
                if let Some(previous) = previous {
                    let current: HashSet<&str> = generated
                        .variants
                        .iter()
                        .map(|v| v.storage_key.as_str())
                        .collect();
                    cleanup.extend(
                        previous
                            .variant_keys()
                            .into_iter()
                            .filter(|k| !current.contains(k.as_str())),
                    );
                }
                info!(
                    listing_id,
                    photo_id,
                    variants = generated.variants.len(),
                    "photo ready"
                );
                ProcessResult::Ready {
                    variant_count: generated.variants.len(),
                }
            }
            Recorded::Failed(error) => {
                cleanup.extend(rollback_keys(uploaded, keep));
                warn!(listing_id, photo_id, error = %error, "photo processing failed");
                ProcessResult::Failed { error }
            }
            Recorded::Unrecorded(error) => {
                // Previous objects stay: nothing saved says they are unused.
                cleanup.extend(rollback_keys(uploaded, keep));
                error!(listing_id, photo_id, error = %error, "photo outcome not recorded");
                ProcessResult::Unrecorded { error }
            }
        };

        let warnings = cleanup.run(self.objects.as_ref()).await;
        PhotoOutcome {
            photo_id: photo_id.to_owned(),
            staged_key: staged_key.to_owned(),
            result,
            warnings,
        }
    }

    async fn generate_variants(
        &self,
        listing_id: &str,
        staged_key: &str,
        uploaded: &mut Vec<String>,
    ) -> Result<Generated, ProcessingError> {
        let head = self
            .objects
            .head(staged_key)
            .await
            .map_err(|e| staged_read_error(staged_key, e))?;
        let content_type = head.content_type.unwrap_or_default();
        if !is_allowed_content_type(&content_type) {
            return Err(ProcessingError::UnsupportedContentType(
                if content_type.is_empty() {
                    "none".to_owned()
                } else {
                    content_type
                },
            ));
        }
        let limit = self.config.max_upload_bytes;
        if head.content_length > limit {
            return Err(ProcessingError::TooLarge {
                size: head.content_length,
                limit,
            });
        }

        let source = self
            .objects
            .get(staged_key)
            .await
            .map_err(|e| staged_read_error(staged_key, e))?;
        if source.len() as u64 > limit {
            return Err(ProcessingError::TooLarge {
                size: source.len() as u64,
                limit,
            });
        }

        let codec = Arc::clone(&self.codec);
        let plan = VariantPlan::from_config(&self.config);
        let owner = listing_id.to_owned();
        let transcoded =
            tokio::task::spawn_blocking(move || transcode(codec.as_ref(), &plan, &owner, &source))
                .await
                .map_err(|e| ProcessingError::Task(e.to_string()))??;

        let mut variants = Vec::with_capacity(transcoded.variants.len());
        for encoded in transcoded.variants {
            let key = encoded.variant.storage_key.clone();
            let options = PutOptions::new(encoded.variant.format.content_type())
                .with_cache_control(VARIANT_CACHE_CONTROL);
            self.objects.put(&key, encoded.bytes, &options).await?;
            uploaded.push(key);
            variants.push(encoded.variant);
        }

        Ok(Generated {
            width: transcoded.width,
            height: transcoded.height,
            variants,
        })
    }

    /// Apply `change` to the slot and save the listing. Returns `false` when
    /// the listing or the slot no longer exists.
    async fn finalize(
        &self,
        listing_id: &str,
        photo_id: &str,
        change: impl FnOnce(&mut OptimizedPhoto) + Send,
    ) -> PhotoResult<bool> {
        let _guard = self.locks.lock(listing_id).await;
        let mut listing = match self.listings.get(listing_id).await {
            Ok(listing) => listing,
            Err(PhotoError::ListingNotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let Some(photo) = listing.photo_mut(photo_id) else {
            return Ok(false);
        };

        change(photo);
        self.listings.save(listing).await?;
        Ok(true)
    }
}
