//! Download links and archive plans.
//!
//! Both hand out presigned `GET` URLs for each photo's best variant with a
//! `Content-Disposition: attachment` override, so browsers save the file
//! under a readable name like `casa-azul-lisboa-photo-03.webp`.

use serde::Serialize;
use tracing::debug;

use crate::codec::ImageCodec;
use crate::error::{PhotoError, PhotoResult};
use crate::manager::PhotoLifecycleManager;
use crate::model::{OptimizedPhoto, VariantFormat};

/// Longest slug kept in filenames.
const MAX_SLUG_LEN: usize = 60;

/// A presigned download for one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    /// The photo.
    pub photo_id: String,
    /// Presigned `GET` URL.
    pub url: String,
    /// Name the browser saves the file under.
    pub filename: String,
    /// Key of the chosen variant.
    pub storage_key: String,
    /// Width label of the chosen variant.
    pub width: u32,
    /// Format of the chosen variant.
    pub format: VariantFormat,
}

/// What an archive of a listing's photos should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipPlan {
    /// Suggested archive filename.
    pub archive_name: String,
    /// One link per downloadable photo, in listing order.
    pub entries: Vec<DownloadLink>,
    /// Ids of optimized photos left out because they are not ready.
    pub skipped: Vec<String>,
}

/// Lowercase ASCII slug of a listing title.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "listing".to_owned()
    } else {
        slug.to_owned()
    }
}

fn photo_filename(slug: &str, number: usize, format: VariantFormat) -> String {
    format!("{slug}-photo-{number:02}.{}", format.extension())
}

impl<C: ImageCodec> PhotoLifecycleManager<C> {
    /// A presigned download for one `READY` photo.
    pub async fn get_download_url(
        &self,
        listing_id: &str,
        photo_id: &str,
    ) -> PhotoResult<DownloadLink> {
        let listing = self.listings.get(listing_id).await?;
        let (index, photo) = listing
            .optimized()
            .enumerate()
            .find(|(_, p)| p.id == photo_id)
            .ok_or_else(|| PhotoError::PhotoNotFound {
                listing_id: listing_id.to_owned(),
                photo_id: photo_id.to_owned(),
            })?;
        if !photo.is_ready() {
            return Err(PhotoError::validation(format!("photo {photo_id} is not ready")));
        }

        self.download_link(&slugify(&listing.title), index + 1, photo)?
            .ok_or_else(|| {
                PhotoError::validation(format!("photo {photo_id} has no downloadable variant"))
            })
    }

    /// Links for every downloadable photo of a listing.
    ///
    /// Photos that are not `READY` are listed in `skipped`. Fails when no
    /// photo at all can be downloaded.
    pub async fn get_zip_plan(&self, listing_id: &str) -> PhotoResult<ZipPlan> {
        let listing = self.listings.get(listing_id).await?;
        let slug = slugify(&listing.title);

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for (index, photo) in listing.optimized().enumerate() {
            let link = if photo.is_ready() {
                self.download_link(&slug, index + 1, photo)?
            } else {
                None
            };
            match link {
                Some(link) => entries.push(link),
                None => skipped.push(photo.id.clone()),
            }
        }

        if entries.is_empty() {
            return Err(PhotoError::validation(format!(
                "listing {listing_id} has no downloadable photos"
            )));
        }
        debug!(listing_id, entries = entries.len(), skipped = skipped.len(), "built zip plan");

        Ok(ZipPlan {
            archive_name: format!("{slug}-photos.zip"),
            entries,
            skipped,
        })
    }

    fn download_link(
        &self,
        slug: &str,
        number: usize,
        photo: &OptimizedPhoto,
    ) -> PhotoResult<Option<DownloadLink>> {
        let Some(variant) = photo.best_download_variant() else {
            return Ok(None);
        };
        let filename = photo_filename(slug, number, variant.format);
        let url = self.objects.presign_download(
            &variant.storage_key,
            self.config.download_url_ttl_secs,
            Some(&filename),
        )?;
        Ok(Some(DownloadLink {
            photo_id: photo.id.clone(),
            url,
            filename,
            storage_key: variant.storage_key.clone(),
            width: variant.width,
            format: variant.format,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::test_support::{Fixture, LISTING_ID};
    use crate::model::{PhotoSlot, VariantKind};

    #[test]
    fn test_should_slugify_titles() {
        assert_eq!(slugify("Casa Azul, Lisboa"), "casa-azul-lisboa");
        assert_eq!(slugify("  --Loft #3 (NYC)--  "), "loft-3-nyc");
        assert_eq!(slugify("Château"), "ch-teau");
        assert_eq!(slugify("!!!"), "listing");
        assert_eq!(slugify(""), "listing");
        assert_eq!(slugify(&"a".repeat(80)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_should_not_end_truncated_slug_with_dash() {
        let title = format!("{} b", "a".repeat(MAX_SLUG_LEN - 1));
        let slug = slugify(&title);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug.len(), MAX_SLUG_LEN - 1);
    }

    #[tokio::test]
    async fn test_should_link_widest_webp_variant() {
        let fixture = Fixture::new();
        fixture.add_legacy("https://cdn.example.com/old.jpg");
        fixture.ingest_one("a").await;
        let second = fixture.ingest_one("b").await;

        let link = fixture
            .manager
            .get_download_url(LISTING_ID, &second)
            .await
            .unwrap();

        assert_eq!(link.width, 2400);
        assert_eq!(link.format, VariantFormat::Webp);
        assert_eq!(link.filename, "casa-azul-lisboa-photo-02.webp");
        assert!(link.url.contains(&link.storage_key));
        assert!(link.url.contains("method=GET"));
        assert!(link.url.contains("expires=3600"));
        assert!(link.url.contains("casa-azul-lisboa-photo-02.webp"));
    }

    #[tokio::test]
    async fn test_should_reject_download_of_unready_photo() {
        let fixture = Fixture::new();
        let staged = fixture.stage_bytes(b"corrupt", "image/jpeg");
        let outcome = fixture
            .manager
            .ingest_staged(LISTING_ID, &[staged])
            .await
            .unwrap();

        let err = fixture
            .manager
            .get_download_url(LISTING_ID, &outcome.photos[0].photo_id)
            .await
            .unwrap_err();

        assert!(matches!(err, PhotoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_should_reject_ready_photo_without_responsive_variant() {
        let fixture = Fixture::new();
        let photo_id = fixture.ingest_one("a").await;
        let mut listing = fixture.listing();
        if let Some(photo) = listing.photo_mut(&photo_id) {
            photo.variants.retain(|v| v.kind == VariantKind::Thumbnail);
        }
        fixture.listings.insert(listing);

        let err = fixture
            .manager
            .get_download_url(LISTING_ID, &photo_id)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no downloadable variant"));
    }

    #[tokio::test]
    async fn test_should_fail_download_of_unknown_photo() {
        let fixture = Fixture::new();
        let err = fixture
            .manager
            .get_download_url(LISTING_ID, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, PhotoError::PhotoNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_plan_zip_of_ready_photos() {
        let fixture = Fixture::new();
        let first = fixture.ingest_one("a").await;
        let bad = fixture.stage_bytes(b"corrupt", "image/jpeg");
        let failed = fixture
            .manager
            .ingest_staged(LISTING_ID, &[bad])
            .await
            .unwrap()
            .photos[0]
            .photo_id
            .clone();
        let third = fixture.ingest_one("c").await;

        let plan = fixture.manager.get_zip_plan(LISTING_ID).await.unwrap();

        assert_eq!(plan.archive_name, "casa-azul-lisboa-photos.zip");
        let ids: Vec<_> = plan.entries.iter().map(|e| e.photo_id.clone()).collect();
        assert_eq!(ids, vec![first, third]);
        assert_eq!(plan.skipped, vec![failed]);
        assert_eq!(plan.entries[1].filename, "casa-azul-lisboa-photo-03.webp");
    }

    #[tokio::test]
    async fn test_should_fail_zip_plan_without_downloadable_photos() {
        let fixture = Fixture::new();
        let mut listing = fixture.listing();
        listing.photos.push(PhotoSlot::Optimized(
            crate::model::OptimizedPhoto::processing("p1"),
        ));
        fixture.listings.insert(listing);

        let err = fixture.manager.get_zip_plan(LISTING_ID).await.unwrap_err();

        assert!(matches!(err, PhotoError::Validation(_)));
    }
}
