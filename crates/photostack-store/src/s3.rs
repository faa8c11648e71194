//! [`ObjectStore`] over HTTP against an S3-compatible endpoint.
//!
//! Requests use path-style addressing (`{endpoint}/{bucket}/{key}`) so the
//! same client works against AWS, R2, MinIO and local emulators. Every call
//! signs with a fresh timestamp; nothing is cached between calls.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use photostack_auth::canonical::build_canonical_uri;
use photostack_auth::{
    EMPTY_PAYLOAD_SHA256, PresignRequest, RequestSigner, SigningRequest, hash_payload,
};
use photostack_core::StoreConfig;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, Response, Url};
use tracing::debug;

use crate::error::StoreError;
use crate::{ObjectHead, ObjectStore, PutOptions, attachment_disposition, normalize_key};

/// HTTP client for one bucket of an S3-compatible store.
///
/// # Examples
///
/// ```
/// use photostack_core::StoreConfig;
/// use photostack_store::{ObjectStore, S3ObjectStore};
///
/// let config = StoreConfig::builder()
///     .endpoint("http://localhost:4566".into())
///     .bucket("listing-media".into())
///     .access_key_id("test".into())
///     .secret_access_key("test".into())
///     .build();
/// let store = S3ObjectStore::new(&config).unwrap();
/// let url = store.presign_upload("listings/1/staging/abc", 900).unwrap();
/// assert!(url.starts_with("http://localhost:4566/listing-media/listings/1/staging/abc?"));
/// ```
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    signer: RequestSigner,
    /// `scheme://host[:port]` of the endpoint.
    origin: String,
    /// Endpoint path prefix without a trailing slash, usually empty.
    base_path: String,
    /// Value of the `host` header reqwest will send.
    host: String,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a store with a default [`reqwest::Client`].
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::with_client(config, Client::new())
    }

    /// Create a store that sends requests through `client`.
    ///
    /// Use this to impose transport timeouts; the store has none of its own.
    pub fn with_client(config: &StoreConfig, client: Client) -> Result<Self, StoreError> {
        config
            .validate()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| StoreError::Config(format!("{}: {e}", config.endpoint)))?;
        let host_name = endpoint
            .host_str()
            .ok_or_else(|| StoreError::Config(format!("endpoint has no host: {}", config.endpoint)))?;
        // `Url::port` is `None` for the scheme's default port, matching what
        // reqwest puts in the `host` header.
        let host = match endpoint.port() {
            Some(port) => format!("{host_name}:{port}"),
            None => host_name.to_owned(),
        };

        Ok(Self {
            client,
            signer: RequestSigner::from_config(config)?,
            origin: format!("{}://{host}", endpoint.scheme()),
            base_path: endpoint.path().trim_end_matches('/').to_owned(),
            host,
            bucket: config.bucket.clone(),
        })
    }

    /// The bucket every key is joined under.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Raw (unencoded) request path for `key`.
    fn object_path(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_path, self.bucket, normalize_key(key))
    }

    /// Full URL for a raw path. The path is encoded exactly as it is in the
    /// canonical request, so the signature covers what goes on the wire.
    fn url_for(&self, path: &str, query: Option<&str>) -> String {
        let uri = build_canonical_uri(path);
        match query {
            Some(query) => format!("{}{uri}?{query}", self.origin),
            None => format!("{}{uri}", self.origin),
        }
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Option<Bytes>,
        options: Option<&PutOptions>,
    ) -> Result<Response, StoreError> {
        let path = self.object_path(key);
        let payload_hash = body
            .as_ref()
            .map_or_else(|| EMPTY_PAYLOAD_SHA256.to_owned(), |b| hash_payload(b));

        let mut headers: Vec<(&str, &str)> = vec![("host", self.host.as_str())];
        if let Some(options) = options {
            headers.push(("content-type", options.content_type.as_str()));
            if let Some(cache_control) = &options.cache_control {
                headers.push(("cache-control", cache_control.as_str()));
            }
        }

        let signature = self.signer.sign_headers(
            &SigningRequest {
                method: method.as_str(),
                path: &path,
                query: &[],
                headers: &headers,
            },
            &payload_hash,
            Utc::now(),
        );

        let mut request = self
            .client
            .request(method.clone(), self.url_for(&path, None))
            .header("authorization", &signature.authorization)
            .header("x-amz-date", &signature.amz_date)
            .header("x-amz-content-sha256", &signature.content_sha256);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        debug!(
            %method,
            bucket = %self.bucket,
            key,
            status = response.status().as_u16(),
            "object store response"
        );
        Ok(response)
    }

    fn presign(
        &self,
        method: &str,
        key: &str,
        expires_secs: u64,
        extra_query: &[(&str, &str)],
    ) -> String {
        let path = self.object_path(key);
        let query = self.signer.presign(
            &PresignRequest {
                method,
                path: &path,
                host: &self.host,
                expires_secs,
                extra_query,
            },
            Utc::now(),
        );
        self.url_for(&path, Some(&query))
    }
}

/// Pass successful responses through; turn anything else into
/// [`StoreError::Status`] carrying the upstream body.
async fn ensure_success(response: Response, key: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_owned()
    } else {
        body
    };
    Err(StoreError::Status {
        status: status.as_u16(),
        key: key.to_owned(),
        message,
    })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let response = self.send(Method::HEAD, key, None, None).await?;
        let response = ensure_success(response, key).await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        // HEAD responses have no body, so the length must come from the header.
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(ObjectHead {
            content_type,
            content_length,
        })
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self.send(Method::GET, key, None, None).await?;
        let response = ensure_success(response, key).await?;
        Ok(response.bytes().await?)
    }

    async fn put(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StoreError> {
        let response = self.send(Method::PUT, key, Some(body), Some(options)).await?;
        ensure_success(response, key).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self.send(Method::DELETE, key, None, None).await?;
        match ensure_success(response, key).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    fn presign_upload(&self, key: &str, expires_secs: u64) -> Result<String, StoreError> {
        Ok(self.presign("PUT", key, expires_secs, &[]))
    }

    fn presign_download(
        &self,
        key: &str,
        expires_secs: u64,
        filename: Option<&str>,
    ) -> Result<String, StoreError> {
        let url = match filename {
            Some(filename) => {
                let disposition = attachment_disposition(filename);
                self.presign(
                    "GET",
                    key,
                    expires_secs,
                    &[("response-content-disposition", disposition.as_str())],
                )
            }
            None => self.presign("GET", key, expires_secs, &[]),
        };
        Ok(url)
    }
}
