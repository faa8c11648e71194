//! Upload slot issuance.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::ImageCodec;
use crate::error::{PhotoError, PhotoResult};
use crate::keys::new_staging_key;
use crate::manager::PhotoLifecycleManager;
use crate::validation::{check_capacity, check_file};

/// A file the caller intends to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Declared `Content-Type`.
    pub content_type: String,
    /// Declared size in bytes.
    pub size: u64,
}

impl UploadRequest {
    /// Describe one file.
    pub fn new(content_type: impl Into<String>, size: u64) -> Self {
        Self {
            content_type: content_type.into(),
            size,
        }
    }
}

/// Where and until when one file may be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    /// Staging key to pass back to `ingest_staged`.
    pub key: String,
    /// Presigned `PUT` URL.
    pub upload_url: String,
    /// The content type the upload should be sent with.
    pub content_type: String,
    /// URL lifetime in seconds.
    pub expires_in_secs: u64,
}

impl<C: ImageCodec> PhotoLifecycleManager<C> {
    /// Issue one staging key and presigned upload URL per file.
    ///
    /// The whole batch is rejected if any file has a disallowed type or size,
    /// or if the listing would exceed its slot limit. Nothing is persisted.
    pub async fn request_upload_slots(
        &self,
        listing_id: &str,
        files: &[UploadRequest],
    ) -> PhotoResult<Vec<UploadSlot>> {
        if files.is_empty() {
            return Err(PhotoError::validation("no files requested"));
        }
        for (index, file) in files.iter().enumerate() {
            check_file(&self.config, &file.content_type, file.size)
                .map_err(|reason| PhotoError::validation(format!("file {index}: {reason}")))?;
        }

        let listing = self.listings.get(listing_id).await?;
        check_capacity(&self.config, listing.photos.len(), files.len())
            .map_err(PhotoError::Validation)?;

        let expires_in_secs = self.config.upload_url_ttl_secs;
        let slots = files
            .iter()
            .map(|file| {
                let key = new_staging_key(listing_id);
                let upload_url = self.objects.presign_upload(&key, expires_in_secs)?;
                Ok(UploadSlot {
                    key,
                    upload_url,
                    content_type: file.content_type.clone(),
                    expires_in_secs,
                })
            })
            .collect::<PhotoResult<Vec<_>>>()?;

        info!(listing_id, count = slots.len(), "issued upload slots");
        Ok(slots)
    }
}
