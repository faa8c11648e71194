//! Photo pipeline configuration.
//!
//! Provides [`PhotoConfig`]: slot and size limits, presigned URL lifetimes,
//! the variant width ladder, and encoder quality settings.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default maximum number of photo slots per listing.
pub const DEFAULT_MAX_PHOTOS: usize = 40;

/// Default per-file upload cap (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Default responsive widths, narrowest first.
pub const DEFAULT_RESPONSIVE_WIDTHS: [u32; 4] = [640, 1024, 1600, 2400];

/// Photo pipeline configuration.
///
/// # Examples
///
/// ```
/// use photostack_photos::PhotoConfig;
///
/// let config = PhotoConfig::default();
/// assert_eq!(config.max_photos, 40);
/// assert_eq!(config.responsive_widths, vec![640, 1024, 1600, 2400]);
/// assert_eq!(config.variants_per_photo(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PhotoConfig {
    /// Maximum slots (legacy and optimized) per listing.
    #[builder(default = DEFAULT_MAX_PHOTOS)]
    pub max_photos: usize,

    /// Maximum size of one uploaded file in bytes.
    #[builder(default = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Lifetime of presigned upload URLs in seconds.
    #[builder(default = 900)]
    pub upload_url_ttl_secs: u64,

    /// Lifetime of presigned download URLs in seconds.
    #[builder(default = 3600)]
    pub download_url_ttl_secs: u64,

    /// Responsive variant widths.
    #[builder(default = DEFAULT_RESPONSIVE_WIDTHS.to_vec())]
    pub responsive_widths: Vec<u32>,

    /// Thumbnail variant width.
    #[builder(default = 400)]
    pub thumbnail_width: u32,

    /// AVIF quality, 1-100.
    #[builder(default = 60)]
    pub avif_quality: u8,

    /// AVIF encoder speed, 1 (slowest) to 10 (fastest).
    #[builder(default = 6)]
    pub avif_speed: u8,

    /// WEBP quality, 0-100.
    #[builder(default = 80.0)]
    pub webp_quality: f32,

    /// WEBP alpha plane quality for images with transparency, 0-100.
    #[builder(default = 90)]
    pub alpha_quality: u8,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PhotoConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PHOTO_MAX_PHOTOS` | `40` |
    /// | `PHOTO_MAX_UPLOAD_BYTES` | `26214400` |
    /// | `PHOTO_UPLOAD_URL_TTL_SECS` | `900` |
    /// | `PHOTO_DOWNLOAD_URL_TTL_SECS` | `3600` |
    /// | `PHOTO_RESPONSIVE_WIDTHS` | `640,1024,1600,2400` |
    /// | `PHOTO_THUMBNAIL_WIDTH` | `400` |
    /// | `PHOTO_AVIF_QUALITY` | `60` |
    /// | `PHOTO_AVIF_SPEED` | `6` |
    /// | `PHOTO_WEBP_QUALITY` | `80` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = parse_var(&lookup, "PHOTO_MAX_PHOTOS") {
            config.max_photos = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_UPLOAD_URL_TTL_SECS") {
            config.upload_url_ttl_secs = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_DOWNLOAD_URL_TTL_SECS") {
            config.download_url_ttl_secs = n;
        }
        if let Some(widths) = lookup("PHOTO_RESPONSIVE_WIDTHS").and_then(|v| parse_widths(&v)) {
            config.responsive_widths = widths;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_THUMBNAIL_WIDTH") {
            config.thumbnail_width = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_AVIF_QUALITY") {
            config.avif_quality = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_AVIF_SPEED") {
            config.avif_speed = n;
        }
        if let Some(n) = parse_var(&lookup, "PHOTO_WEBP_QUALITY") {
            config.webp_quality = n;
        }

        config
    }

    /// Number of variants one processed photo produces.
    #[must_use]
    pub fn variants_per_photo(&self) -> usize {
        (self.responsive_widths.len() + 1) * crate::model::VariantFormat::ALL.len()
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

/// Parse a comma separated width list; any bad or zero entry rejects it.
fn parse_widths(value: &str) -> Option<Vec<u32>> {
    let widths = value
        .split(',')
        .map(|w| w.trim().parse::<u32>().ok().filter(|w| *w > 0))
        .collect::<Option<Vec<_>>>()?;
    (!widths.is_empty()).then_some(widths)
}
