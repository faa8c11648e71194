//! Listing and photo data model.
//!
//! A [`Listing`] owns an ordered list of [`PhotoSlot`]s; index 0 is the
//! cover. Each slot is either a [`LegacyMediaAsset`] (a plain URL that is
//! carried along but never processed) or an [`OptimizedPhoto`] that moves
//! through the processing state machine:
//!
//! ```text
//! (staged) -> PROCESSING -> READY | FAILED
//! READY | FAILED -> PROCESSING (replace) -> READY | FAILED
//! any -> deleted
//! ```
//!
//! Slots serialize with a `type` discriminant (`legacy` / `optimized`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Encoded image format of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFormat {
    /// AV1 Image File Format.
    Avif,
    /// WebP.
    Webp,
}

impl VariantFormat {
    /// Every format a photo is encoded to, in encoding order.
    pub const ALL: [Self; 2] = [Self::Avif, Self::Webp];

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
        }
    }

    /// MIME type used when uploading the variant.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Webp => "image/webp",
        }
    }

    /// Download preference at equal width; higher wins.
    pub(crate) fn download_rank(self) -> u8 {
        match self {
            Self::Avif => 0,
            Self::Webp => 1,
        }
    }
}

/// What a variant is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantKind {
    /// One of the `srcset` widths.
    Responsive,
    /// The small grid thumbnail.
    Thumbnail,
}

/// One stored rendition of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Content-addressed object key.
    pub storage_key: String,
    /// Target width label. The encoded image is narrower when the source was.
    pub width: u32,
    /// Encoded format.
    pub format: VariantFormat,
    /// Responsive size or thumbnail.
    pub kind: VariantKind,
    /// Encoded size in bytes.
    pub byte_size: u64,
}

// ---------------------------------------------------------------------------
// OptimizedPhoto
// ---------------------------------------------------------------------------

/// Processing state of an [`OptimizedPhoto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoStatus {
    /// Variants are being generated. The slot has no variants.
    Processing,
    /// Variants are available.
    Ready,
    /// The last processing attempt failed; `error` says why.
    Failed,
}

/// A photo managed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedPhoto {
    /// Identifier, unique within the listing.
    pub id: String,
    /// Current state.
    pub status: PhotoStatus,
    /// Failure message for `FAILED` photos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Natural width of the decoded source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Natural height of the decoded source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Stored renditions.
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// When the slot was created.
    pub created_at: DateTime<Utc>,
    /// When the slot last changed state.
    pub updated_at: DateTime<Utc>,
}

impl OptimizedPhoto {
    /// A fresh placeholder in `PROCESSING`.
    #[must_use]
    pub fn processing(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: PhotoStatus::Processing,
            error: None,
            width: None,
            height: None,
            variants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the photo can be served.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == PhotoStatus::Ready
    }

    /// Distinct variant keys, in variant order.
    #[must_use]
    pub fn variant_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            if !keys.contains(&variant.storage_key) {
                keys.push(variant.storage_key.clone());
            }
        }
        keys
    }

    /// The variant handed out for downloads: the widest responsive variant,
    /// WEBP before AVIF at equal width. Thumbnails are never chosen.
    #[must_use]
    pub fn best_download_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .filter(|v| v.kind == VariantKind::Responsive)
            .max_by_key(|v| (v.width, v.format.download_rank()))
    }

    /// Re-enter `PROCESSING`, dropping variants, dimensions and any error.
    pub(crate) fn mark_processing(&mut self) {
        self.status = PhotoStatus::Processing;
        self.error = None;
        self.width = None;
        self.height = None;
        self.variants.clear();
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_ready(&mut self, width: u32, height: u32, variants: Vec<Variant>) {
        self.status = PhotoStatus::Ready;
        self.error = None;
        self.width = Some(width);
        self.height = Some(height);
        self.variants = variants;
        self.updated_at = Utc::now();
    }

    /// Enter `FAILED`. With `keep` the variants and dimensions of that earlier
    /// version are put back; otherwise the slot is left without variants.
    pub(crate) fn mark_failed(&mut self, error: impl Into<String>, keep: Option<&Self>) {
        self.status = PhotoStatus::Failed;
        self.error = Some(error.into());
        match keep {
            Some(previous) => {
                self.width = previous.width;
                self.height = previous.height;
                self.variants.clone_from(&previous.variants);
            }
            None => {
                self.width = None;
                self.height = None;
                self.variants.clear();
            }
        }
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// PhotoSlot / Listing
// ---------------------------------------------------------------------------

/// A media reference that predates the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMediaAsset {
    /// Where the asset lives.
    pub url: String,
    /// Optional caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One entry of a listing's photo sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PhotoSlot {
    /// Carried along unchanged.
    Legacy(LegacyMediaAsset),
    /// Managed by the pipeline.
    Optimized(OptimizedPhoto),
}

impl PhotoSlot {
    /// The optimized photo in this slot, if any.
    #[must_use]
    pub fn as_optimized(&self) -> Option<&OptimizedPhoto> {
        match self {
            Self::Optimized(photo) => Some(photo),
            Self::Legacy(_) => None,
        }
    }

    /// Mutable access to the optimized photo in this slot, if any.
    pub fn as_optimized_mut(&mut self) -> Option<&mut OptimizedPhoto> {
        match self {
            Self::Optimized(photo) => Some(photo),
            Self::Legacy(_) => None,
        }
    }
}

/// The part of a listing record the pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing identifier; also the key prefix of every object it owns.
    pub id: String,
    /// Human title, used for download filenames.
    pub title: String,
    /// Ordered photo slots. Index 0 is the cover.
    #[serde(default)]
    pub photos: Vec<PhotoSlot>,
}

impl Listing {
    /// An empty listing.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            photos: Vec::new(),
        }
    }

    /// Iterate over optimized photos in listing order.
    pub fn optimized(&self) -> impl Iterator<Item = &OptimizedPhoto> {
        self.photos.iter().filter_map(PhotoSlot::as_optimized)
    }

    /// Ids of optimized photos in listing order.
    #[must_use]
    pub fn optimized_ids(&self) -> Vec<String> {
        self.optimized().map(|p| p.id.clone()).collect()
    }

    /// Look up an optimized photo by id.
    #[must_use]
    pub fn photo(&self, photo_id: &str) -> Option<&OptimizedPhoto> {
        self.optimized().find(|p| p.id == photo_id)
    }

    /// Mutable lookup of an optimized photo by id.
    pub fn photo_mut(&mut self, photo_id: &str) -> Option<&mut OptimizedPhoto> {
        self.photos
            .iter_mut()
            .filter_map(PhotoSlot::as_optimized_mut)
            .find(|p| p.id == photo_id)
    }

    /// Slot index of an optimized photo.
    #[must_use]
    pub fn position(&self, photo_id: &str) -> Option<usize> {
        self.photos
            .iter()
            .position(|slot| slot.as_optimized().is_some_and(|p| p.id == photo_id))
    }
}
