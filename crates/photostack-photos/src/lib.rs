//! Listing photo lifecycle for PhotoStack.
//!
//! Browsers upload originals straight to object storage through presigned
//! URLs; this crate takes it from there. [`PhotoLifecycleManager`] turns each
//! staged upload into a fixed set of content-addressed AVIF and WEBP variants,
//! records the result on the owning [`Listing`], and handles replacement,
//! deletion, reordering and download links afterwards.
//!
//! ```text
//! request_upload_slots ──► browser PUT ──► ingest_staged
//!                                             │
//!            HEAD ─► GET ─► transcode ─► PUT variants ─► READY | FAILED
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use photostack_photos::{
//!     InMemoryListingStore, Listing, PhotoConfig, PhotoLifecycleManager, UploadRequest,
//! };
//! use photostack_store::InMemoryObjectStore;
//!
//! let listings = Arc::new(InMemoryListingStore::new());
//! listings.insert(Listing::new("42", "Casa Azul"));
//! let manager = PhotoLifecycleManager::with_default_codec(
//!     PhotoConfig::default(),
//!     Arc::new(InMemoryObjectStore::new()),
//!     listings,
//! );
//!
//! let slots = tokio_test::block_on(
//!     manager.request_upload_slots("42", &[UploadRequest::new("image/jpeg", 2_000_000)]),
//! )
//! .unwrap();
//! assert!(slots[0].key.starts_with("listings/42/staging/"));
//! ```
//!
//! # Modules
//!
//! - [`keys`] - Object key layout
//! - [`model`] - Listings, photo slots and variants
//! - [`ops`] - The operations, as `impl` blocks on the manager
//! - [`validation`] - Upload content type and size rules

mod cleanup;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod listing_store;
mod locks;
pub mod manager;
pub mod model;
pub mod ops;
mod transcode;
pub mod validation;

pub use cleanup::CleanupWarning;
pub use codec::{CodecError, DecodedImage, ImageCodec, RustImageCodec};
pub use config::PhotoConfig;
pub use error::{ErrorKind, PhotoError, PhotoResult, ProcessingError};
pub use listing_store::{InMemoryListingStore, ListingStore};
pub use manager::PhotoLifecycleManager;
pub use model::{
    LegacyMediaAsset, Listing, OptimizedPhoto, PhotoSlot, PhotoStatus, Variant, VariantFormat,
    VariantKind,
};
pub use ops::download::{DownloadLink, ZipPlan};
pub use ops::ingest::{IngestOutcome, PhotoOutcome, ProcessResult};
pub use ops::manage::{DeleteOutcome, ReplaceOutcome};
pub use ops::upload::{UploadRequest, UploadSlot};
