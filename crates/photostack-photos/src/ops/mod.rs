//! Photo operations.
//!
//! Each submodule adds methods to [`crate::PhotoLifecycleManager`]:
//!
//! - [`upload`]: `request_upload_slots`
//! - [`ingest`]: `ingest_staged` and the per-photo processing step
//! - [`manage`]: `replace_photo`, `delete_photo`, `reorder_photos`
//! - [`download`]: `get_download_url`, `get_zip_plan`

pub mod download;
pub mod ingest;
pub mod manage;
pub mod upload;
