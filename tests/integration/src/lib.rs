//! Integration tests for PhotoStack against a live S3-compatible endpoint.
//!
//! These tests require a running server (LocalStack, MinIO, ...) at
//! `localhost:4566` or `S3_ENDPOINT`. They are marked `#[ignore]` so they
//! don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p photostack-integration -- --ignored
//! ```

mod test_pipeline;
mod test_store;

use std::sync::Once;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use photostack_auth::{EMPTY_PAYLOAD_SHA256, RequestSigner, SigningRequest};
use photostack_core::StoreConfig;
use photostack_store::S3ObjectStore;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Store configuration for a fresh bucket on the local server.
#[must_use]
pub fn test_config(prefix: &str) -> StoreConfig {
    init_tracing();

    StoreConfig::builder()
        .endpoint(endpoint_url())
        .bucket(test_bucket_name(prefix))
        .access_key_id("test".to_owned())
        .secret_access_key("test".to_owned())
        .build()
}

/// Create the configured bucket with a signed `PUT /{bucket}`.
pub async fn create_bucket(config: &StoreConfig) -> Result<()> {
    let url = reqwest::Url::parse(&config.endpoint).context("invalid endpoint")?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_owned(),
        (None, _) => bail!("endpoint has no host: {}", config.endpoint),
    };
    let path = format!("/{}", config.bucket);

    let signer = RequestSigner::from_config(config)?;
    let signature = signer.sign_headers(
        &SigningRequest {
            method: "PUT",
            path: &path,
            query: &[],
            headers: &[("host", host.as_str())],
        },
        EMPTY_PAYLOAD_SHA256,
        Utc::now(),
    );

    let response = reqwest::Client::new()
        .put(format!("{}{path}", config.endpoint.trim_end_matches('/')))
        .header("authorization", signature.authorization)
        .header("x-amz-date", signature.amz_date)
        .header("x-amz-content-sha256", signature.content_sha256)
        .send()
        .await
        .with_context(|| format!("failed to create bucket {}", config.bucket))?;
    if !response.status().is_success() {
        bail!(
            "failed to create bucket {}: {}",
            config.bucket,
            response.text().await.unwrap_or_default()
        );
    }
    Ok(())
}

/// Create a bucket and a store bound to it. Objects are left behind; the
/// bucket name is unique per test.
pub async fn create_test_store(prefix: &str) -> (StoreConfig, S3ObjectStore) {
    let config = test_config(prefix);
    create_bucket(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {}: {e:#}", config.bucket));
    let store = S3ObjectStore::new(&config).expect("store config is valid");
    (config, store)
}
