//! Object store integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use photostack_store::{ObjectStore, PutOptions};

    use crate::create_test_store;

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_head_get_and_delete_object() {
        let (_, store) = create_test_store("crud").await;
        let options = PutOptions::new("image/webp").with_cache_control("public, max-age=60");

        store
            .put("listings/1/photos/a.webp", Bytes::from_static(b"webp bytes"), &options)
            .await
            .expect("put");

        let head = store.head("listings/1/photos/a.webp").await.expect("head");
        assert_eq!(head.content_type.as_deref(), Some("image/webp"));
        assert_eq!(head.content_length, 10);

        let body = store.get("/listings/1/photos/a.webp").await.expect("get");
        assert_eq!(body.as_ref(), b"webp bytes");

        store.delete("listings/1/photos/a.webp").await.expect("delete");
        let err = store.head("listings/1/photos/a.webp").await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_treat_delete_of_missing_key_as_success() {
        let (_, store) = create_test_store("delmissing").await;
        store.delete("never/written").await.expect("delete");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_object_status() {
        let (_, store) = create_test_store("missing").await;
        let err = store.get("never/written").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_through_presigned_url() {
        let (_, store) = create_test_store("presignput").await;
        let url = store
            .presign_upload("listings/1/staging/upload", 300)
            .expect("presign");

        let response = reqwest::Client::new()
            .put(&url)
            .header("content-type", "image/jpeg")
            .body("jpeg bytes")
            .send()
            .await
            .expect("presigned put");
        assert!(response.status().is_success(), "status {}", response.status());

        let head = store.head("listings/1/staging/upload").await.expect("head");
        assert_eq!(head.content_length, 10);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_download_with_attachment_disposition() {
        let (_, store) = create_test_store("presignget").await;
        store
            .put(
                "listings/1/photos/b.webp",
                Bytes::from_static(b"image"),
                &PutOptions::new("image/webp"),
            )
            .await
            .expect("put");

        let url = store
            .presign_download("listings/1/photos/b.webp", 300, Some("casa-photo-01.webp"))
            .expect("presign");
        let response = reqwest::get(&url).await.expect("presigned get");

        assert!(response.status().is_success(), "status {}", response.status());
        let disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(disposition.starts_with("attachment"), "{disposition}");
        assert!(disposition.contains("casa-photo-01.webp"), "{disposition}");
        assert_eq!(response.bytes().await.expect("body").as_ref(), b"image");
    }
}
