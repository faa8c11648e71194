//! Object key layout.
//!
//! ```text
//! listings/{listing_id}/staging/{uuid}                  pending upload
//! listings/{listing_id}/photos/v1/{hash}/{width}.{ext}  responsive variant
//! listings/{listing_id}/photos/v1/{hash}/thumb.{ext}    thumbnail variant
//! ```
//!
//! `{hash}` is a prefix of the SHA-256 of the variant's encoded bytes, so a
//! variant key never points at different content and can be cached forever.

use sha2::{Digest, Sha256};

/// Version segment of the variant layout.
pub const VARIANT_LAYOUT_VERSION: &str = "v1";

/// `Cache-Control` sent with every variant upload.
pub const VARIANT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Bytes of the SHA-256 digest kept in variant keys.
const HASH_PREFIX_BYTES: usize = 16;

/// Prefix under which staged uploads for a listing live.
#[must_use]
pub fn staging_prefix(listing_id: &str) -> String {
    format!("listings/{listing_id}/staging/")
}

/// A fresh, unique staging key.
#[must_use]
pub fn new_staging_key(listing_id: &str) -> String {
    format!("{}{}", staging_prefix(listing_id), uuid::Uuid::new_v4())
}

/// Whether `key` names a staged upload of `listing_id`.
///
/// # Examples
///
/// ```
/// use photostack_photos::keys::is_staging_key_for;
///
/// assert!(is_staging_key_for("42", "listings/42/staging/abc"));
/// assert!(!is_staging_key_for("42", "listings/43/staging/abc"));
/// assert!(!is_staging_key_for("42", "listings/42/staging/"));
/// assert!(!is_staging_key_for("42", "listings/42/staging/../photos/x"));
/// ```
#[must_use]
pub fn is_staging_key_for(listing_id: &str, key: &str) -> bool {
    key.strip_prefix(&staging_prefix(listing_id))
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

/// Content-addressed key for an encoded variant.
///
/// `label` is the width (`"1600"`) or `"thumb"`.
#[must_use]
pub fn variant_key(listing_id: &str, encoded: &[u8], label: &str, extension: &str) -> String {
    let digest = Sha256::digest(encoded);
    let hash = hex::encode(&digest[..HASH_PREFIX_BYTES]);
    format!("listings/{listing_id}/photos/{VARIANT_LAYOUT_VERSION}/{hash}/{label}.{extension}")
}
