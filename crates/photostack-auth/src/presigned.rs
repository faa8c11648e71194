//! Presigned URL query construction for AWS Signature Version 4.
//!
//! Presigned URLs carry authentication information in query parameters rather
//! than HTTP headers:
//!
//! - `X-Amz-Algorithm` - always `AWS4-HMAC-SHA256`
//! - `X-Amz-Credential` - `AKID/date/region/s3/aws4_request`
//! - `X-Amz-Date` - ISO 8601 basic format timestamp (`YYYYMMDDTHHMMSSZ`)
//! - `X-Amz-Expires` - validity duration in seconds
//! - `X-Amz-SignedHeaders` - always `host`
//! - `X-Amz-Signature` - the hex-encoded signature, appended last
//!
//! Extra parameters such as `response-content-disposition` are signed along
//! with the authentication parameters. The payload hash is `UNSIGNED-PAYLOAD`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::canonical::{build_canonical_query_string, build_canonical_request};
use crate::credentials::Credentials;
use crate::sigv4::{
    SIGNING_ALGORITHM, UNSIGNED_PAYLOAD, amz_date, build_string_to_sign, compute_signature,
    credential_scope, date_stamp, derive_signing_key, hash_canonical_request,
};

/// Longest validity SigV4 accepts for a presigned URL (seven days).
pub const MAX_PRESIGN_EXPIRES_SECS: u64 = 604_800;

/// A request to be authorised through the query string.
#[derive(Debug, Clone, Copy)]
pub struct PresignRequest<'a> {
    /// HTTP method the URL will be used with (`GET` or `PUT`).
    pub method: &'a str,
    /// Raw (unencoded) request path, e.g. `/bucket/listings/42/staging/abc`.
    pub path: &'a str,
    /// Value of the `host` header the holder will send.
    pub host: &'a str,
    /// Validity in seconds, clamped to `1..=604800`.
    pub expires_secs: u64,
    /// Additional raw query parameters to sign, e.g. `response-content-disposition`.
    pub extra_query: &'a [(&'a str, &'a str)],
}

/// Build the complete, signed query string for a presigned URL.
///
/// The returned string is already percent-encoded and ready to be appended
/// after `?`.
#[must_use]
pub fn build_presigned_query(
    credentials: &Credentials,
    region: &str,
    request: &PresignRequest<'_>,
    now: DateTime<Utc>,
) -> String {
    let timestamp = amz_date(now);
    let date = date_stamp(now);
    let scope = credential_scope(&date, region);
    let credential = format!("{}/{scope}", credentials.access_key_id());
    let expires = request.expires_secs.clamp(1, MAX_PRESIGN_EXPIRES_SECS).to_string();

    let mut params: Vec<(&str, &str)> = vec![
        ("X-Amz-Algorithm", SIGNING_ALGORITHM),
        ("X-Amz-Credential", credential.as_str()),
        ("X-Amz-Date", timestamp.as_str()),
        ("X-Amz-Expires", expires.as_str()),
        ("X-Amz-SignedHeaders", "host"),
    ];
    params.extend_from_slice(request.extra_query);

    let canonical_request = build_canonical_request(
        request.method,
        request.path,
        &params,
        &[("host", request.host)],
        UNSIGNED_PAYLOAD,
    );

    debug!(canonical_request, "built presigned canonical request");

    let string_to_sign =
        build_string_to_sign(&timestamp, &scope, &hash_canonical_request(&canonical_request));
    let signing_key = derive_signing_key(credentials.secret_access_key(), &date, region);
    let signature = compute_signature(&signing_key, &string_to_sign);

    format!(
        "{}&X-Amz-Signature={signature}",
        build_canonical_query_string(&params)
    )
}
