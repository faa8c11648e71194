//! End-to-end photo pipeline tests with the real image codec.

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use bytes::Bytes;
    use image::{ImageFormat, Rgb, RgbImage};
    use photostack_photos::keys::new_staging_key;
    use photostack_photos::{
        InMemoryListingStore, Listing, PhotoConfig, PhotoLifecycleManager, PhotoStatus,
        ProcessResult,
    };
    use photostack_store::{ObjectStore, PutOptions};

    use crate::create_test_store;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_ingest_and_download_photo() {
        let (_, store) = create_test_store("pipeline").await;
        let store = Arc::new(store);
        let listings = Arc::new(InMemoryListingStore::new());
        listings.insert(Listing::new("7", "Loft on Rua Augusta"));
        let manager = PhotoLifecycleManager::with_default_codec(
            PhotoConfig::default(),
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&listings) as _,
        );

        let staged = new_staging_key("7");
        store
            .put(
                &staged,
                Bytes::from(sample_png(64, 48)),
                &PutOptions::new("image/png"),
            )
            .await
            .expect("stage");

        let outcome = manager
            .ingest_staged("7", &[staged.clone()])
            .await
            .expect("ingest");

        assert_eq!(
            outcome.photos[0].result,
            ProcessResult::Ready { variant_count: 10 }
        );
        let photo_id = &outcome.photos[0].photo_id;
        let photo = outcome.listing.photo(photo_id).expect("photo");
        assert_eq!(photo.status, PhotoStatus::Ready);
        assert_eq!((photo.width, photo.height), (Some(64), Some(48)));
        for key in photo.variant_keys() {
            let head = store.head(&key).await.expect("variant exists");
            assert!(head.content_length > 0);
        }
        assert!(store.head(&staged).await.unwrap_err().is_not_found());

        let link = manager
            .get_download_url("7", photo_id)
            .await
            .expect("download url");
        assert_eq!(link.filename, "loft-on-rua-augusta-photo-01.webp");
        let body = reqwest::get(&link.url)
            .await
            .expect("download")
            .bytes()
            .await
            .expect("body");
        assert_eq!(&body[..4], b"RIFF");

        let deleted = manager.delete_photo("7", photo_id).await.expect("delete");
        assert!(deleted.warnings.is_empty());
        for key in &deleted.deleted_keys {
            assert!(store.head(key).await.unwrap_err().is_not_found());
        }
    }
}
