use anime_list_config::GalleryConfig;
use anime_list_core::{GalleryError, GalleryService};
use anime_list_sources::{LocalIdentity, MemoryDocumentStore, MemoryObjectStore};
use std::sync::Arc;

struct Harness {
    documents: MemoryDocumentStore,
    objects: MemoryObjectStore,
    identity: Arc<LocalIdentity>,
    gallery: GalleryService,
}

fn harness(identity: LocalIdentity) -> Harness {
    let documents = MemoryDocumentStore::new();
    let objects = MemoryObjectStore::new();
    let identity = Arc::new(identity);
    let config = GalleryConfig {
        max_file_size_bytes: 1024,
    };
    let gallery = GalleryService::new(
        Arc::new(documents.clone()),
        Arc::new(objects.clone()),
        identity.clone(),
        &config,
    );
    Harness {
        documents,
        objects,
        identity,
        gallery,
    }
}

#[tokio::test]
async fn upload_stores_object_and_record() {
    let h = harness(LocalIdentity::signed_in("uid-1"));

    let image = h
        .gallery
        .upload("poster.png", "image/png", vec![0u8; 300])
        .await
        .unwrap();

    let path = image.storage_path.clone().unwrap();
    assert!(path.starts_with("user-images/uid-1/"));
    assert!(path.ends_with("-poster.png"));
    assert!(h.objects.contains(&path));
    assert_eq!(h.objects.content_type(&path).as_deref(), Some("image/png"));
    assert_eq!(image.image_url, format!("memory://{}", path));
    assert_eq!(image.file_size, 300);
    assert!(!image.id.is_empty());
    assert_eq!(h.documents.calls().add, 1);
}

#[tokio::test]
async fn rejected_files_never_reach_the_backend() {
    let h = harness(LocalIdentity::signed_in("uid-1"));

    let not_image = h.gallery.upload("notes.txt", "text/plain", vec![1, 2, 3]).await;
    let too_large = h.gallery.upload("big.jpg", "image/jpeg", vec![0u8; 2048]).await;

    assert!(matches!(not_image, Err(GalleryError::NotAnImage(t)) if t == "text/plain"));
    assert!(matches!(too_large, Err(GalleryError::TooLarge { size: 2048, limit: 1024 })));
    assert_eq!(h.objects.calls(), 0);
    assert_eq!(h.documents.calls().total(), 0);
}

#[tokio::test]
async fn size_limit_is_inclusive() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    assert!(h.gallery.validate("image/webp", 1024).is_ok());
    assert!(h.gallery.validate("image/webp", 1025).is_err());
}

#[tokio::test]
async fn signed_out_user_cannot_use_gallery() {
    let h = harness(LocalIdentity::new());

    let upload = h.gallery.upload("a.png", "image/png", vec![0u8; 10]).await;
    let list = h.gallery.list().await;

    assert!(matches!(upload, Err(GalleryError::NotAuthenticated)));
    assert!(matches!(list, Err(GalleryError::NotAuthenticated)));
    assert_eq!(h.objects.calls(), 0);
    assert_eq!(h.documents.calls().total(), 0);
}

#[tokio::test]
async fn list_shows_only_own_images_newest_first() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    let first = h.gallery.upload("one.png", "image/png", vec![1]).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = h.gallery.upload("two.png", "image/png", vec![2]).await.unwrap();

    h.identity.sign_in("uid-2");
    h.gallery.upload("other.png", "image/png", vec![3]).await.unwrap();
    h.identity.sign_in("uid-1");

    let images = h.gallery.list().await.unwrap();
    let ids: Vec<&str> = images.iter().map(|image| image.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert!(images.iter().all(|image| image.user_id == "uid-1"));

    let found = h.gallery.find(&first.id).await.unwrap();
    assert_eq!(found.map(|image| image.file_name), Some("one.png".to_string()));
}

#[tokio::test]
async fn delete_removes_object_and_record() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    let image = h.gallery.upload("one.png", "image/png", vec![1]).await.unwrap();
    let path = image.storage_path.clone().unwrap();

    h.gallery.delete(&image).await.unwrap();

    assert!(!h.objects.contains(&path));
    assert!(h.gallery.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_tolerates_missing_object() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    let mut image = h.gallery.upload("one.png", "image/png", vec![1]).await.unwrap();
    image.storage_path = Some("user-images/uid-1/gone.png".to_string());

    h.gallery.delete(&image).await.unwrap();

    assert!(h.gallery.find(&image.id).await.unwrap().is_none());
}

#[tokio::test]
async fn object_store_failure_leaves_no_record() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    h.objects.set_offline(true);

    let result = h.gallery.upload("one.png", "image/png", vec![1]).await;

    assert!(matches!(result, Err(GalleryError::Remote(_))));
    assert_eq!(h.documents.calls().add, 0);
}

#[tokio::test]
async fn failed_record_write_removes_the_object() {
    let h = harness(LocalIdentity::signed_in("uid-1"));
    h.documents.set_offline(true);

    let result = h.gallery.upload("one.png", "image/png", vec![1, 2]).await;

    assert!(matches!(result, Err(GalleryError::Remote(_))));
    // One upload, then one delete of the orphaned object
    assert_eq!(h.objects.calls(), 2);
    assert_eq!(h.objects.object_count(), 0);
}
