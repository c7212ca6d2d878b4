//! Per-user image gallery: object storage for the bytes, one metadata
//! document per image.

use crate::error::GalleryError;
use anime_list_config::GalleryConfig;
use anime_list_models::{GalleryImage, UserId};
use anime_list_sources::{DocumentPath, DocumentStore, IdentityProvider, ObjectStore};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct GalleryService {
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    identity: Arc<dyn IdentityProvider>,
    max_file_size: u64,
}

impl GalleryService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &GalleryConfig,
    ) -> Self {
        Self {
            documents,
            objects,
            identity,
            max_file_size: config.max_file_size_bytes,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn user(&self) -> Result<UserId, GalleryError> {
        self.identity.current_user_id().ok_or(GalleryError::NotAuthenticated)
    }

    /// Checks that run before anything is sent to the backend
    pub fn validate(&self, content_type: &str, size: u64) -> Result<(), GalleryError> {
        if !content_type.starts_with("image/") {
            return Err(GalleryError::NotAnImage(content_type.to_string()));
        }
        if size > self.max_file_size {
            return Err(GalleryError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<GalleryImage, GalleryError> {
        let user_id = self.user()?;
        self.validate(content_type, bytes.len() as u64)?;

        let now = Utc::now();
        let storage_path = GalleryImage::storage_path_for(user_id.as_str(), now, file_name);
        let stored = self.objects.upload(&storage_path, bytes, content_type).await?;
        debug!(user_id = %user_id, path = %stored.path, "image stored");

        let object_path = stored.path.clone();
        let image = GalleryImage {
            id: String::new(),
            user_id: user_id.to_string(),
            image_url: stored.download_url,
            storage_path: Some(stored.path),
            created_at: Some(now),
            file_type: content_type.to_string(),
            file_name: file_name.to_string(),
            file_size: stored.size,
        };
        let id = match self.record(&image).await {
            Ok(id) => id,
            Err(err) => {
                self.discard(&object_path).await;
                return Err(err);
            }
        };
        info!(user_id = %user_id, image_id = %id, file_name, "image uploaded");
        Ok(image.with_id(id))
    }

    async fn record(&self, image: &GalleryImage) -> Result<String, GalleryError> {
        let document = match serde_json::to_value(image)? {
            Value::Object(document) => document,
            other => return Err(GalleryError::Decode(serde::de::Error::custom(format!(
                "image record serialized to {}",
                other
            )))),
        };
        Ok(self.documents.add(GalleryImage::COLLECTION, document).await?)
    }

    /// Best-effort removal of an object whose record could not be written
    async fn discard(&self, path: &str) {
        match self.objects.delete(path).await {
            Ok(()) => debug!(path, "removed orphaned image"),
            Err(err) => warn!(path, error = %err, "could not remove orphaned image"),
        }
    }

    /// The signed-in user's images, newest first
    pub async fn list(&self) -> Result<Vec<GalleryImage>, GalleryError> {
        let user_id = self.user()?;
        let documents = self
            .documents
            .query_eq(
                GalleryImage::COLLECTION,
                GalleryImage::FIELD_USER_ID,
                json!(user_id.as_str()),
            )
            .await?;

        let mut images = documents
            .into_iter()
            .map(|doc| {
                let image: GalleryImage = serde_json::from_value(Value::Object(doc.data))?;
                Ok(image.with_id(doc.id))
            })
            .collect::<Result<Vec<_>, GalleryError>>()?;
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(user_id = %user_id, count = images.len(), "listed gallery");
        Ok(images)
    }

    /// Delete the stored object (when there is one), then the record
    pub async fn delete(&self, image: &GalleryImage) -> Result<(), GalleryError> {
        let user_id = self.user()?;
        if let Some(path) = image.storage_path.as_deref().filter(|p| !p.is_empty()) {
            match self.objects.delete(path).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    warn!(path, "stored object already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.documents
            .delete(&DocumentPath::new(GalleryImage::COLLECTION, image.id.clone()))
            .await?;
        info!(user_id = %user_id, image_id = %image.id, "image deleted");
        Ok(())
    }

    /// Find one of the signed-in user's images by id
    pub async fn find(&self, id: &str) -> Result<Option<GalleryImage>, GalleryError> {
        Ok(self.list().await?.into_iter().find(|image| image.id == id))
    }
}
