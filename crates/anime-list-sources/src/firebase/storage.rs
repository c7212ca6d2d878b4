use crate::error::{SourceError, SourceResult};
use crate::firebase::auth::FirebaseAuth;
use crate::http::ensure_success;
use crate::traits::{ObjectStore, StoredObject};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Firebase Storage REST adapter
#[derive(Clone)]
pub struct FirebaseStorage {
    client: Client,
    auth: Arc<FirebaseAuth>,
    bucket: String,
}

impl FirebaseStorage {
    pub fn new(client: Client, auth: Arc<FirebaseAuth>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            auth,
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/b/{}/o/{}", STORAGE_URL, self.bucket, urlencoding::encode(path))
    }

    /// Public URL for an object; the download token grants read access
    pub fn download_url(&self, path: &str, token: Option<&str>) -> String {
        match token {
            Some(token) => format!(
                "{}?alt=media&token={}",
                self.object_url(path),
                urlencoding::encode(token)
            ),
            None => format!("{}?alt=media", self.object_url(path)),
        }
    }
}

#[async_trait]
impl ObjectStore for FirebaseStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> SourceResult<StoredObject> {
        let token = self.auth.id_token().await?;
        let uploaded = bytes.len() as u64;
        let response = self
            .client
            .post(format!("{}/b/{}/o", STORAGE_URL, self.bucket))
            .query(&[("uploadType", "media"), ("name", path)])
            .header(AUTHORIZATION, format!("Firebase {}", token))
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let metadata: ObjectMetadata = ensure_success(response).await?.json().await?;

        // Tokens are comma-separated when an object has several
        let download_token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next());
        let size = metadata
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(uploaded);
        debug!(path = %metadata.name, size, "object uploaded");

        Ok(StoredObject {
            download_url: self.download_url(&metadata.name, download_token),
            path: metadata.name,
            size,
        })
    }

    async fn delete(&self, path: &str) -> SourceResult<()> {
        if path.is_empty() {
            return Err(SourceError::InvalidInput("object path is empty".to_string()));
        }
        let token = self.auth.id_token().await?;
        let response = self
            .client
            .delete(self.object_url(path))
            .header(AUTHORIZATION, format!("Firebase {}", token))
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(path, "object deleted");
        Ok(())
    }
}
