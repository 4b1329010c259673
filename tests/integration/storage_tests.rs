//! AssetStore (R2) integration tests.

use std::time::Duration;

/// Test that the client can reach the configured bucket.
#[tokio::test]
#[ignore = "requires R2"]
async fn test_storage_connectivity() {
    dotenvy::dotenv().ok();

    let client = advgen_storage::R2Client::from_env()
        .await
        .expect("Failed to create R2 client");

    client
        .check_connectivity()
        .await
        .expect("Failed connectivity check");
}

/// Test a basic upload/download/delete round trip for bytes.
#[tokio::test]
#[ignore = "requires R2"]
async fn test_upload_download_delete_roundtrip() {
    dotenvy::dotenv().ok();

    let client = advgen_storage::R2Client::from_env()
        .await
        .expect("Failed to create R2 client");

    let key = format!("integration-tests/{}.bin", uuid::Uuid::new_v4());
    let payload = b"advgen integration test payload".to_vec();

    client
        .upload_bytes(payload.clone(), &key, "application/octet-stream")
        .await
        .expect("Failed to upload bytes");

    assert!(client.exists(&key).await.expect("Failed to check existence"));

    let downloaded = client
        .download_bytes(&key)
        .await
        .expect("Failed to download bytes");
    assert_eq!(downloaded, payload);

    client
        .delete_object(&key)
        .await
        .expect("Failed to delete object");

    assert!(!client.exists(&key).await.expect("Failed to check existence after delete"));
}

/// Test that a presigned GET URL is well-formed and scoped to the key.
#[tokio::test]
#[ignore = "requires R2"]
async fn test_presign_get_url() {
    dotenvy::dotenv().ok();

    let client = advgen_storage::R2Client::from_env()
        .await
        .expect("Failed to create R2 client");

    let key = format!("integration-tests/{}.jpg", uuid::Uuid::new_v4());
    client
        .upload_bytes(b"fake-jpeg-bytes".to_vec(), &key, "image/jpeg")
        .await
        .expect("Failed to upload bytes");

    let url = client
        .presign_get(&key, Duration::from_secs(3600))
        .await
        .expect("Failed to presign GET url");
    assert!(url.contains(&key));

    client.delete_object(&key).await.ok();
}

/// Test batch deletion of multiple objects.
#[tokio::test]
#[ignore = "requires R2"]
async fn test_delete_objects_batch() {
    dotenvy::dotenv().ok();

    let client = advgen_storage::R2Client::from_env()
        .await
        .expect("Failed to create R2 client");

    let prefix = format!("integration-tests/batch-{}", uuid::Uuid::new_v4());
    let mut keys = Vec::new();
    for i in 0..3 {
        let key = format!("{prefix}/{i}.bin");
        client
            .upload_bytes(vec![i as u8], &key, "application/octet-stream")
            .await
            .expect("Failed to upload bytes");
        keys.push(key);
    }

    let deleted = client
        .delete_objects(&keys)
        .await
        .expect("Failed to delete objects");
    assert_eq!(deleted, keys.len() as u32);
}
