//! Image decoding, resizing and encoding.
//!
//! The pipeline talks to images only through the [`ImageCodec`] trait so the
//! lifecycle manager can be driven by a cheap test double. [`RustImageCodec`]
//! is the production implementation:
//!
//! | Step | Implementation |
//! |---|---|
//! | Decode | `image::ImageReader` with format sniffing, EXIF orientation applied |
//! | Decode HEIC/HEIF | `libheif-rs` (feature `heif`), container transforms applied |
//! | Resize | Lanczos3, aspect ratio preserved |
//! | AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | WEBP | `webp::Encoder` (libwebp), lossy with a separate alpha quality |
//!
//! Without the `heif` feature HEIF sources are rejected with a decode error,
//! and validation does not accept their content types in the first place.

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use webp::WebPConfig;

use crate::config::PhotoConfig;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The source bytes are not a decodable image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Resizing failed.
    #[error("resize failed: {0}")]
    Resize(String),

    /// Encoding a variant failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// A decoded source image and the facts the pipeline needs about it.
#[derive(Debug, Clone)]
pub struct DecodedImage<I> {
    /// Codec-specific pixel data.
    pub image: I,
    /// Natural width after orientation is applied.
    pub width: u32,
    /// Natural height after orientation is applied.
    pub height: u32,
    /// Whether the image has an alpha channel.
    pub has_alpha: bool,
}

/// The operations the pipeline needs from an image library.
///
/// Implementations are called from a blocking thread.
pub trait ImageCodec: Send + Sync + std::fmt::Debug + 'static {
    /// Decoded pixel representation.
    type Image: Send + 'static;

    /// Decode source bytes.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage<Self::Image>, CodecError>;

    /// Resize to `width`, keeping the aspect ratio.
    fn resize(&self, image: &Self::Image, width: u32) -> Result<Self::Image, CodecError>;

    /// Encode to AVIF.
    fn encode_avif(&self, image: &Self::Image, has_alpha: bool) -> Result<Vec<u8>, CodecError>;

    /// Encode to WEBP.
    fn encode_webp(&self, image: &Self::Image, has_alpha: bool) -> Result<Vec<u8>, CodecError>;
}

/// ISO-BMFF major brands of HEIF still images and sequences.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
];

/// Whether `bytes` start with a HEIF `ftyp` box.
fn is_heif(bytes: &[u8]) -> bool {
    bytes.len() >= 12
        && &bytes[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == brand.as_slice())
}

#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    use image::{RgbImage, RgbaImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_error = |e: libheif_rs::HeifError| CodecError::Decode(format!("heif: {e}"));

    let lib = LibHeif::new();
    let context = HeifContext::read_from_bytes(bytes).map_err(heif_error)?;
    let handle = context.primary_image_handle().map_err(heif_error)?;
    let has_alpha = handle.has_alpha_channel();
    let chroma = if has_alpha { RgbChroma::Rgba } else { RgbChroma::Rgb };
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(heif_error)?;

    let plane = decoded
        .planes()
        .interleaved
        .ok_or_else(|| CodecError::Decode("heif: no interleaved plane".to_owned()))?;
    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * if has_alpha { 4 } else { 3 };
    if row_len == 0 || plane.stride < row_len {
        return Err(CodecError::Decode(format!(
            "heif: bad plane layout ({width}px wide, stride {})",
            plane.stride
        )));
    }

    // Rows can be padded past the pixel data.
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        let row = row
            .get(..row_len)
            .ok_or_else(|| CodecError::Decode("heif: truncated row".to_owned()))?;
        pixels.extend_from_slice(row);
    }

    let image = if has_alpha {
        RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| CodecError::Decode("heif: pixel buffer size mismatch".to_owned()))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    Err(CodecError::Decode(
        "HEIF support not enabled (build with the `heif` feature)".to_owned(),
    ))
}

/// [`ImageCodec`] backed by the `image` and `webp` crates.
#[derive(Debug, Clone)]
pub struct RustImageCodec {
    avif_quality: u8,
    avif_speed: u8,
    webp_quality: f32,
    alpha_quality: u8,
}

impl Default for RustImageCodec {
    fn default() -> Self {
        Self::from_config(&PhotoConfig::default())
    }
}

impl RustImageCodec {
    /// Take encoder settings from a [`PhotoConfig`].
    #[must_use]
    pub fn from_config(config: &PhotoConfig) -> Self {
        Self {
            avif_quality: config.avif_quality.clamp(1, 100),
            avif_speed: config.avif_speed.clamp(1, 10),
            webp_quality: config.webp_quality.clamp(0.0, 100.0),
            alpha_quality: config.alpha_quality.min(100),
        }
    }

    /// Collapse to 8-bit RGB or RGBA, the layouts both encoders accept.
    fn to_encodable(image: &DynamicImage, has_alpha: bool) -> DynamicImage {
        if has_alpha {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    }
}

impl ImageCodec for RustImageCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage<DynamicImage>, CodecError> {
        if is_heif(bytes) {
            let image = decode_heif(bytes)?;
            return Ok(DecodedImage {
                width: image.width(),
                height: image.height(),
                has_alpha: image.color().has_alpha(),
                image,
            });
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(CodecError::Decode("unrecognized image format".to_owned()));
        }

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let orientation = decoder
            .orientation()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let mut image =
            DynamicImage::from_decoder(decoder).map_err(|e| CodecError::Decode(e.to_string()))?;
        image.apply_orientation(orientation);

        Ok(DecodedImage {
            width: image.width(),
            height: image.height(),
            has_alpha: image.color().has_alpha(),
            image,
        })
    }

    fn resize(&self, image: &DynamicImage, width: u32) -> Result<DynamicImage, CodecError> {
        if width == 0 || image.width() == 0 {
            return Err(CodecError::Resize(format!(
                "cannot resize {}px wide image to {width}px",
                image.width()
            )));
        }
        if width == image.width() {
            return Ok(image.clone());
        }

        let height = u64::from(image.height()) * u64::from(width) / u64::from(image.width());
        let height = u32::try_from(height.max(1)).unwrap_or(u32::MAX);
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode_avif(&self, image: &DynamicImage, has_alpha: bool) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut out, self.avif_speed, self.avif_quality);
        Self::to_encodable(image, has_alpha)
            .write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(format!("avif: {e}")))?;
        Ok(out)
    }

    fn encode_webp(&self, image: &DynamicImage, has_alpha: bool) -> Result<Vec<u8>, CodecError> {
        let image = Self::to_encodable(image, has_alpha);
        let encoder = webp::Encoder::from_image(&image)
            .map_err(|e| CodecError::Encode(format!("webp: {e}")))?;

        let mut config = WebPConfig::new()
            .map_err(|()| CodecError::Encode("webp: failed to initialise config".to_owned()))?;
        config.lossless = 0;
        config.quality = self.webp_quality;
        config.alpha_compression = 1;
        config.alpha_quality = i32::from(self.alpha_quality);

        let memory = encoder
            .encode_advanced(&config)
            .map_err(|e| CodecError::Encode(format!("webp: {e:?}")))?;
        Ok(memory.to_vec())
    }
}
