use crate::document::{Document, DocumentPath, DocumentUpdate, StoredDocument, Subscription};
use crate::error::SourceResult;
use anime_list_models::UserId;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

/// Hosted, schemaless, keyed document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read; `None` when the document does not exist
    async fn get(&self, path: &DocumentPath) -> SourceResult<Option<Document>>;

    /// Full-document write (create or replace)
    async fn set(&self, path: &DocumentPath, document: Document) -> SourceResult<()>;

    /// Atomic field-level update of an existing document
    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> SourceResult<()>;

    /// Live subscription; the current document is delivered first, then every change
    async fn subscribe(&self, path: &DocumentPath) -> SourceResult<Subscription>;

    /// Insert under a generated key, returning the key
    async fn add(&self, collection: &str, document: Document) -> SourceResult<String>;

    /// Documents in `collection` whose `field` equals `value`
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> SourceResult<Vec<StoredDocument>>;

    async fn delete(&self, path: &DocumentPath) -> SourceResult<()>;
}

/// Source of the signed-in user and of session changes
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;

    /// Receives the new user (or `None`) on every sign-in, sign-out or user switch
    fn watch_user(&self) -> watch::Receiver<Option<UserId>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub download_url: String,
    pub size: u64,
}

/// Hosted blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> SourceResult<StoredObject>;

    async fn delete(&self, path: &str) -> SourceResult<()>;
}
