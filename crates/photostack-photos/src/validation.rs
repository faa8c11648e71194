//! Upload validation shared by slot issuance and ingestion.

use crate::config::PhotoConfig;

/// Content types every build accepts.
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/pjpeg", "image/png"];

/// Content types accepted only when built with the `heif` feature, which
/// brings the decoder for them.
const HEIF_CONTENT_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

/// Whether `content_type` names an accepted photo format.
///
/// Parameters and case are ignored. HEIC/HEIF is accepted only with the
/// `heif` feature.
///
/// # Examples
///
/// ```
/// use photostack_photos::validation::is_allowed_content_type;
///
/// assert!(is_allowed_content_type("image/jpeg"));
/// assert!(is_allowed_content_type("IMAGE/PNG"));
/// assert!(is_allowed_content_type("image/png; charset=binary"));
/// assert!(!is_allowed_content_type("image/gif"));
/// assert!(!is_allowed_content_type("video/mp4"));
/// ```
#[must_use]
pub fn is_allowed_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .parse::<mime::Mime>()
        .is_ok_and(|m| {
            let essence = m.essence_str().to_ascii_lowercase();
            m.type_() == mime::IMAGE
                && (ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
                    || (cfg!(feature = "heif") && HEIF_CONTENT_TYPES.contains(&essence.as_str())))
        })
}

/// Check one file's declared type and size, returning the reason it is
/// rejected.
pub(crate) fn check_file(
    config: &PhotoConfig,
    content_type: &str,
    size: u64,
) -> Result<(), String> {
    if !is_allowed_content_type(content_type) {
        return Err(format!("unsupported content type: {content_type}"));
    }
    if size == 0 {
        return Err("file is empty".to_owned());
    }
    if size > config.max_upload_bytes {
        return Err(format!(
            "file is {size} bytes, limit is {}",
            config.max_upload_bytes
        ));
    }
    Ok(())
}

/// Check that `adding` more slots fit next to `existing` ones.
pub(crate) fn check_capacity(
    config: &PhotoConfig,
    existing: usize,
    adding: usize,
) -> Result<(), String> {
    if existing + adding > config.max_photos {
        return Err(format!(
            "listing has {existing} photos; adding {adding} would exceed the limit of {}",
            config.max_photos
        ));
    }
    Ok(())
}
