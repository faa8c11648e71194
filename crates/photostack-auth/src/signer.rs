//! The request signer used by the object store client.
//!
//! [`RequestSigner`] owns the credentials and signing region. It is built
//! once (construction is the only fallible step) and then signs any number of
//! requests, each with the timestamp the caller supplies.

use chrono::{DateTime, Utc};
use photostack_core::StoreConfig;
use tracing::debug;

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::presigned::{PresignRequest, build_presigned_query};
use crate::sigv4::{
    SIGNING_ALGORITHM, amz_date, build_string_to_sign, compute_signature, credential_scope,
    date_stamp, derive_signing_key, hash_canonical_request,
};

/// A request to be authorised with an `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    /// HTTP method, e.g. `PUT`.
    pub method: &'a str,
    /// Raw (unencoded) request path.
    pub path: &'a str,
    /// Raw query parameters.
    pub query: &'a [(&'a str, &'a str)],
    /// Headers to sign; must include `host`. `x-amz-date` and
    /// `x-amz-content-sha256` are added when absent.
    pub headers: &'a [(&'a str, &'a str)],
}

/// The result of header-mode signing: every header value the request must
/// carry for the signature to verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSignature {
    /// Value for the `Authorization` header.
    pub authorization: String,
    /// Value for the `x-amz-date` header.
    pub amz_date: String,
    /// Value for the `x-amz-content-sha256` header.
    pub content_sha256: String,
    /// The `;`-joined signed header names.
    pub signed_headers: String,
    /// The hex signature on its own.
    pub signature: String,
}

/// Produces SigV4 signatures for a single set of credentials and region.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
}

impl RequestSigner {
    /// Create a signer for the given credentials and region.
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Result<Self, AuthError> {
        let region = region.into();
        if region.trim().is_empty() {
            return Err(AuthError::MissingRegion);
        }
        Ok(Self {
            credentials,
            region,
        })
    }

    /// Create a signer from a [`StoreConfig`].
    pub fn from_config(config: &StoreConfig) -> Result<Self, AuthError> {
        let credentials = Credentials::new(&config.access_key_id, &config.secret_access_key)?;
        Self::new(credentials, &config.region)
    }

    /// The signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The access key id placed in credential scopes.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        self.credentials.access_key_id()
    }

    /// Sign a request for header authentication.
    ///
    /// `payload_hash` is the hex SHA-256 of the body (see
    /// [`crate::sigv4::hash_payload`]).
    #[must_use]
    pub fn sign_headers(
        &self,
        request: &SigningRequest<'_>,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> HeaderSignature {
        let timestamp = amz_date(now);
        let date = date_stamp(now);
        let scope = credential_scope(&date, &self.region);

        let mut headers: Vec<(&str, &str)> = request.headers.to_vec();
        let has_header = |name: &str| {
            request
                .headers
                .iter()
                .any(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        };
        if !has_header("x-amz-date") {
            headers.push(("x-amz-date", timestamp.as_str()));
        }
        if !has_header("x-amz-content-sha256") {
            headers.push(("x-amz-content-sha256", payload_hash));
        }

        let canonical_request = build_canonical_request(
            request.method,
            request.path,
            request.query,
            &headers,
            payload_hash,
        );

        debug!(canonical_request, "built canonical request");

        let string_to_sign =
            build_string_to_sign(&timestamp, &scope, &hash_canonical_request(&canonical_request));
        let signing_key =
            derive_signing_key(self.credentials.secret_access_key(), &date, &self.region);
        let signature = compute_signature(&signing_key, &string_to_sign);
        let signed_headers = build_signed_headers_string(&headers);

        let authorization = format!(
            "{SIGNING_ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id()
        );

        HeaderSignature {
            authorization,
            amz_date: timestamp,
            content_sha256: payload_hash.to_owned(),
            signed_headers,
            signature,
        }
    }

    /// Build the signed query string for a presigned URL.
    #[must_use]
    pub fn presign(&self, request: &PresignRequest<'_>, now: DateTime<Utc>) -> String {
        build_presigned_query(&self.credentials, &self.region, request, now)
    }
}
