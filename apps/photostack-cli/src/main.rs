//! PhotoStack CLI - object store and photo pipeline tooling.
//!
//! Talks to the S3-compatible store configured through the environment.
//! Useful for checking credentials, minting presigned URLs by hand, and
//! running local files through the full photo pipeline.
//!
//! # Usage
//!
//! ```text
//! photostack presign-upload <key> [expires-secs]
//! photostack presign-download <key> [expires-secs] [filename]
//! photostack head <key>
//! photostack ingest <listing-id> <title> <file>...
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3_ENDPOINT` | *(required)* | Store base URL |
//! | `S3_REGION` | `us-east-1` | Signing region |
//! | `S3_BUCKET` | *(required)* | Bucket name |
//! | `S3_ACCESS_KEY_ID` | *(required)* | Access key (falls back to `AWS_ACCESS_KEY_ID`) |
//! | `S3_SECRET_ACCESS_KEY` | *(required)* | Secret key (falls back to `AWS_SECRET_ACCESS_KEY`) |
//! | `PHOTO_*` | see `PhotoConfig` | Pipeline limits and encoder settings |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use photostack_core::StoreConfig;
use photostack_photos::keys::new_staging_key;
use photostack_photos::{InMemoryListingStore, Listing, PhotoConfig, PhotoLifecycleManager};
use photostack_store::{ObjectStore, PutOptions, S3ObjectStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage:
  photostack presign-upload <key> [expires-secs]
  photostack presign-download <key> [expires-secs] [filename]
  photostack head <key>
  photostack ingest <listing-id> <title> <file>...";

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so command output stays pipeable.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn parse_expires(arg: Option<&String>, default: u64) -> Result<u64> {
    arg.map_or(Ok(default), |value| {
        value
            .parse()
            .with_context(|| format!("invalid expiry in seconds: {value}"))
    })
}

/// Content type for a local file, from its extension.
fn content_type_for(path: &Path) -> Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => bail!("unsupported file type: {}", path.display()),
    })
}

/// Stage local files, ingest them into a scratch listing and print the
/// outcome as JSON.
async fn ingest(store: Arc<S3ObjectStore>, listing_id: &str, title: &str, files: &[String]) -> Result<()> {
    let listings = Arc::new(InMemoryListingStore::new());
    listings.insert(Listing::new(listing_id, title));
    let manager = PhotoLifecycleManager::with_default_codec(
        PhotoConfig::from_env(),
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        listings,
    );

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let path = Path::new(file);
        let content_type = content_type_for(path)?;
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        let key = new_staging_key(listing_id);
        store
            .put(&key, Bytes::from(body), &PutOptions::new(content_type))
            .await
            .with_context(|| format!("cannot stage {}", path.display()))?;
        info!(file = %path.display(), key = %key, "staged file");
        staged.push(key);
    }

    let outcome = manager.ingest_staged(listing_id, &staged).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!("{USAGE}");
    };

    let config = StoreConfig::from_env().context("cannot load store configuration")?;
    init_tracing(&config.log_level)?;
    info!(
        endpoint = %config.endpoint,
        bucket = %config.bucket,
        region = %config.region,
        version = VERSION,
        command,
        "starting photostack",
    );

    let store = Arc::new(S3ObjectStore::new(&config).context("cannot create object store")?);
    let photo_config = PhotoConfig::from_env();

    match (command, &args[1..]) {
        ("presign-upload", [key, rest @ ..]) => {
            let expires = parse_expires(rest.first(), photo_config.upload_url_ttl_secs)?;
            println!("{}", store.presign_upload(key, expires)?);
        }
        ("presign-download", [key, rest @ ..]) => {
            let expires = parse_expires(rest.first(), photo_config.download_url_ttl_secs)?;
            let filename = rest.get(1).map(String::as_str);
            println!("{}", store.presign_download(key, expires, filename)?);
        }
        ("head", [key]) => {
            let head = store
                .head(key)
                .await
                .with_context(|| format!("HEAD {key} failed"))?;
            println!(
                "content-type: {}\ncontent-length: {}",
                head.content_type.as_deref().unwrap_or("-"),
                head.content_length
            );
        }
        ("ingest", [listing_id, title, files @ ..]) if !files.is_empty() => {
            ingest(store, listing_id, title, files).await?;
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}
