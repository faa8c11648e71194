//! Turning one decoded source into its full set of encoded variants.
//!
//! Pure CPU work: no I/O happens here, so the whole thing runs inside
//! `spawn_blocking`.

use bytes::Bytes;
use tracing::debug;

use crate::codec::{CodecError, ImageCodec};
use crate::config::PhotoConfig;
use crate::keys::variant_key;
use crate::model::{Variant, VariantFormat, VariantKind};

/// The widths to produce, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VariantPlan {
    targets: Vec<(u32, VariantKind)>,
}

impl VariantPlan {
    pub(crate) fn from_config(config: &PhotoConfig) -> Self {
        let mut targets: Vec<(u32, VariantKind)> = config
            .responsive_widths
            .iter()
            .map(|w| (*w, VariantKind::Responsive))
            .collect();
        targets.push((config.thumbnail_width, VariantKind::Thumbnail));
        Self { targets }
    }
}

/// An encoded variant ready to upload.
#[derive(Debug, Clone)]
pub(crate) struct EncodedVariant {
    pub(crate) variant: Variant,
    pub(crate) bytes: Bytes,
}

/// Everything produced from one source.
#[derive(Debug, Clone)]
pub(crate) struct Transcoded {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) variants: Vec<EncodedVariant>,
}

/// Decode `source` and encode every planned width to every format.
///
/// Sources narrower than a target are never upscaled: the variant is encoded
/// at the natural width and keeps the target as its label.
pub(crate) fn transcode<C: ImageCodec>(
    codec: &C,
    plan: &VariantPlan,
    listing_id: &str,
    source: &[u8],
) -> Result<Transcoded, CodecError> {
    let decoded = codec.decode(source)?;
    debug!(
        width = decoded.width,
        height = decoded.height,
        has_alpha = decoded.has_alpha,
        "decoded source image"
    );

    let mut variants = Vec::with_capacity(plan.targets.len() * VariantFormat::ALL.len());
    for (target, kind) in &plan.targets {
        let effective = (*target).min(decoded.width);
        let resized;
        let image = if effective < decoded.width {
            resized = codec.resize(&decoded.image, effective)?;
            &resized
        } else {
            &decoded.image
        };

        let label = match kind {
            VariantKind::Responsive => target.to_string(),
            VariantKind::Thumbnail => "thumb".to_owned(),
        };

        for format in VariantFormat::ALL {
            let encoded = match format {
                VariantFormat::Avif => codec.encode_avif(image, decoded.has_alpha)?,
                VariantFormat::Webp => codec.encode_webp(image, decoded.has_alpha)?,
            };
            let storage_key = variant_key(listing_id, &encoded, &label, format.extension());
            variants.push(EncodedVariant {
                variant: Variant {
                    storage_key,
                    width: *target,
                    format,
                    kind: *kind,
                    byte_size: encoded.len() as u64,
                },
                bytes: Bytes::from(encoded),
            });
        }
    }

    Ok(Transcoded {
        width: decoded.width,
        height: decoded.height,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::codec::mock::{MockCodec, mock_source};

    fn plan() -> VariantPlan {
        VariantPlan::from_config(&PhotoConfig::default())
    }

    #[test]
    fn test_should_produce_ten_distinct_variants() {
        let out = transcode(&MockCodec, &plan(), "42", &mock_source(3000, 2000, "a")).unwrap();

        assert_eq!((out.width, out.height), (3000, 2000));
        assert_eq!(out.variants.len(), 10);
        let keys: HashSet<_> = out.variants.iter().map(|v| &v.variant.storage_key).collect();
        assert_eq!(keys.len(), 10);
        assert_eq!(
            out.variants
                .iter()
                .filter(|v| v.variant.kind == VariantKind::Thumbnail)
                .count(),
            2
        );
        assert!(
            out.variants
                .iter()
                .all(|v| v.variant.storage_key.starts_with("listings/42/photos/v1/"))
        );
    }

    #[test]
    fn test_should_not_upscale_small_sources() {
        let out = transcode(&MockCodec, &plan(), "42", &mock_source(800, 600, "a")).unwrap();

        let largest = out
            .variants
            .iter()
            .find(|v| v.variant.width == 2400 && v.variant.format == VariantFormat::Webp)
            .unwrap();
        // Encoded at the natural width but labelled with the target.
        assert!(largest.bytes.starts_with(b"webp:800:"));
        assert!(largest.variant.storage_key.ends_with("/2400.webp"));

        let keys: HashSet<_> = out.variants.iter().map(|v| &v.variant.storage_key).collect();
        assert_eq!(keys.len(), 10);
    }

    #[test]
    fn test_should_be_deterministic_for_identical_sources() {
        let a = transcode(&MockCodec, &plan(), "42", &mock_source(3000, 2000, "a")).unwrap();
        let b = transcode(&MockCodec, &plan(), "42", &mock_source(3000, 2000, "a")).unwrap();
        let keys = |t: &Transcoded| {
            t.variants
                .iter()
                .map(|v| v.variant.storage_key.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn test_should_pass_alpha_to_encoders() {
        let out = transcode(&MockCodec, &plan(), "42", &mock_source(1000, 1000, "alpha")).unwrap();
        assert!(out.variants[0].bytes.starts_with(b"avif:640:true:"));
    }

    #[test]
    fn test_should_fail_on_undecodable_source() {
        assert!(matches!(
            transcode(&MockCodec, &plan(), "42", b"corrupt"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_should_record_byte_sizes() {
        let out = transcode(&MockCodec, &plan(), "42", &mock_source(3000, 2000, "a")).unwrap();
        assert!(
            out.variants
                .iter()
                .all(|v| v.variant.byte_size == v.bytes.len() as u64)
        );
    }
}
