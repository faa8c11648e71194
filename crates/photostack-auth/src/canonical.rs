//! Canonical request construction for AWS Signature Version 4.
//!
//! This module implements the canonical request format as specified by AWS:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Unlike a verifier, which must reproduce whatever encoding the client
//! happened to use, the signer owns the encoding: paths and query parameters
//! arrive raw and are encoded here exactly once.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// The set of characters that must be percent-encoded.
///
/// Everything except the RFC 3986 unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) is encoded, which includes the
/// sub-delimiters `!`, `'`, `(`, `)` and `*` that `encodeURIComponent` style
/// encoders leave alone.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
///
/// `path` is the raw (unencoded) request path and `query` the raw query
/// parameters. Every header passed in is signed.
///
/// # Examples
///
/// ```
/// use photostack_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/test.txt",
///     &[],
///     &[("host", "examplebucket.s3.amazonaws.com")],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("GET\n/test.txt\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query: &[(&str, &str)],
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(path);
    let canonical_query = build_canonical_query_string(query);
    let header_map = normalize_headers(headers);
    let canonical_headers = header_map
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("\n");
    let signed_headers = header_map.keys().cloned().collect::<Vec<_>>().join(";");

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers}\n{payload_hash}"
    )
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Forward slashes (`/`) separate segments and are never encoded. Empty paths
/// are normalized to `/`.
///
/// # Examples
///
/// ```
/// use photostack_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/bucket/listings/1/photo (1).jpg"), "/bucket/listings/1/photo%20%281%29.jpg");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    let encoded = path
        .split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/");

    if encoded.starts_with('/') {
        encoded
    } else {
        format!("/{encoded}")
    }
}

/// Build the canonical query string from raw parameters.
///
/// Names and values are encoded first, then the pairs are sorted by encoded
/// name and, for duplicate names, by encoded value.
///
/// # Examples
///
/// ```
/// use photostack_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(&[]), "");
/// assert_eq!(
///     build_canonical_query_string(&[("b", "2"), ("a", "it's (1)")]),
///     "a=it%27s%20%281%29&b=2"
/// );
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &[(&str, &str)]) -> String {
    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the signed headers string as a semicolon-separated list of lowercase
/// header names, sorted lexicographically.
///
/// # Examples
///
/// ```
/// use photostack_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&[("X-Amz-Date", "x"), ("Host", "h")]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(headers: &[(&str, &str)]) -> String {
    normalize_headers(headers)
        .keys()
        .cloned()
        .collect::<Vec<_>>()
        .join(";")
}

/// URI-encode a single path segment or query component.
#[must_use]
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Lowercase names, trim and collapse values, merge duplicates with commas.
fn normalize_headers(headers: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let lower_name = name.trim().to_lowercase();
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(lower_name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }
    header_map
}

/// Collapse consecutive whitespace characters in a string to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
