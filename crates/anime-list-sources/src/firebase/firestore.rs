//! Firestore REST adapter.
//!
//! Live subscriptions are polled: a background task re-reads the document on
//! a fixed interval and pushes a snapshot whenever its `updateTime` changes.

use crate::document::{Document, DocumentPath, DocumentUpdate, Snapshot, StoredDocument, Subscription};
use crate::error::{SourceError, SourceResult};
use crate::firebase::auth::FirebaseAuth;
use crate::firebase::value::{decode_fields, encode, encode_fields};
use crate::http::ensure_success;
use crate::traits::DocumentStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    update_time: Option<String>,
}

impl RawDocument {
    fn key(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    auth: Arc<FirebaseAuth>,
    /// `projects/{project}/databases/{database}/documents`
    root: String,
    poll_interval: Duration,
}

impl FirestoreClient {
    pub fn new(
        client: Client,
        auth: Arc<FirebaseAuth>,
        project_id: &str,
        database_id: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            auth,
            root: format!("projects/{}/databases/{}/documents", project_id, database_id),
            poll_interval,
        }
    }

    fn resource_name(&self, path: &DocumentPath) -> String {
        format!("{}/{}/{}", self.root, path.collection(), path.id())
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/{}", FIRESTORE_URL, self.resource_name(path))
    }

    fn root_url(&self) -> String {
        format!("{}/{}", FIRESTORE_URL, self.root)
    }

    async fn authorized(&self, request: RequestBuilder) -> SourceResult<RequestBuilder> {
        let token = self.auth.id_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn fetch(&self, path: &DocumentPath) -> SourceResult<Option<RawDocument>> {
        let response = self
            .authorized(self.client.get(self.document_url(path)))
            .await?
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = ensure_success(response).await?.json().await?;
        Ok(Some(raw))
    }

    /// Body of the single-write `documents:commit` request for an atomic update
    fn commit_body(&self, path: &DocumentPath, update: &DocumentUpdate) -> Value {
        let mut fields = Map::new();
        let mut mask = Vec::new();
        for (field, value) in &update.set {
            fields.insert(field.clone(), encode(value));
            mask.push(field_path(field));
        }

        let mut transforms = Vec::new();
        for (field, values) in &update.array_union {
            transforms.push(json!({
                "fieldPath": field_path(field),
                "appendMissingElements": { "values": values.iter().map(encode).collect::<Vec<_>>() },
            }));
        }
        for (field, values) in &update.array_remove {
            transforms.push(json!({
                "fieldPath": field_path(field),
                "removeAllFromArray": { "values": values.iter().map(encode).collect::<Vec<_>>() },
            }));
        }

        let mut write = json!({
            "update": { "name": self.resource_name(path), "fields": fields },
            "updateMask": { "fieldPaths": mask },
            "currentDocument": { "exists": true },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }
        json!({ "writes": [write] })
    }

    async fn poll(self, path: DocumentPath, sender: mpsc::UnboundedSender<Snapshot>, mut version: Option<String>) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if sender.is_closed() {
                break;
            }

            let raw = match self.fetch(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path, error = %err, "live subscription poll failed");
                    let _ = sender.send(Err(err));
                    break;
                }
            };

            let current = raw.as_ref().map(|doc| doc.update_time.clone().unwrap_or_default());
            if current == version {
                continue;
            }
            debug!(path = %path, update_time = ?current, "document changed");
            version = current;

            let snapshot = raw.map(|doc| decode_fields(&doc.fields)).transpose();
            let failed = snapshot.is_err();
            if sender.send(snapshot).is_err() || failed {
                break;
            }
        }
    }
}

/// Quote a field name unless it is a simple identifier
fn field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn query_body(collection: &str, field: &str, value: &Value) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field_path(field) },
                    "op": "EQUAL",
                    "value": encode(value),
                }
            }
        }
    })
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get(&self, path: &DocumentPath) -> SourceResult<Option<Document>> {
        match self.fetch(path).await? {
            Some(raw) => Ok(Some(decode_fields(&raw.fields)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> SourceResult<()> {
        let response = self
            .authorized(self.client.patch(self.document_url(path)))
            .await?
            .json(&json!({ "fields": encode_fields(&document) }))
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(path = %path, "document written");
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> SourceResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let response = self
            .authorized(self.client.post(format!("{}:commit", self.root_url())))
            .await?
            .json(&self.commit_body(path, &update))
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(path = %path, "document updated");
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> SourceResult<Subscription> {
        // The first read doubles as the attach: failures surface here
        let initial = self.fetch(path).await?;
        let version = initial.as_ref().map(|doc| doc.update_time.clone().unwrap_or_default());
        let snapshot = initial.map(|doc| decode_fields(&doc.fields)).transpose()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(Ok(snapshot));

        let poller = self.clone();
        let handle = tokio::spawn(poller.poll(path.clone(), sender, version));
        debug!(path = %path, interval = ?self.poll_interval, "live subscription attached");
        Ok(Subscription::new(receiver, move || handle.abort()))
    }

    async fn add(&self, collection: &str, document: Document) -> SourceResult<String> {
        let response = self
            .authorized(self.client.post(format!("{}/{}", self.root_url(), collection)))
            .await?
            .json(&json!({ "fields": encode_fields(&document) }))
            .send()
            .await?;
        let raw: RawDocument = ensure_success(response).await?.json().await?;
        Ok(raw.key().to_string())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> SourceResult<Vec<StoredDocument>> {
        let response = self
            .authorized(self.client.post(format!("{}:runQuery", self.root_url())))
            .await?
            .json(&query_body(collection, field, &value))
            .send()
            .await?;
        let results: Vec<QueryResult> = ensure_success(response).await?.json().await?;

        results
            .into_iter()
            .filter_map(|result| result.document)
            .map(|raw| {
                Ok(StoredDocument {
                    id: raw.key().to_string(),
                    data: decode_fields(&raw.fields)?,
                })
            })
            .collect()
    }

    async fn delete(&self, path: &DocumentPath) -> SourceResult<()> {
        let response = self
            .authorized(self.client.delete(self.document_url(path)))
            .await?
            .send()
            .await?;
        match ensure_success(response).await {
            Ok(_) | Err(SourceError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FirestoreClient {
        let auth = Arc::new(FirebaseAuth::new(Client::new(), "key"));
        FirestoreClient::new(Client::new(), auth, "vault-dev", "(default)", Duration::from_secs(2))
    }

    #[test]
    fn test_document_url() {
        let path = DocumentPath::new("animeLists", "uid-1");
        assert_eq!(
            client().document_url(&path),
            "https://firestore.googleapis.com/v1/projects/vault-dev/databases/(default)/documents/animeLists/uid-1"
        );
    }

    #[test]
    fn test_commit_body_uses_array_transforms() {
        let path = DocumentPath::new("animeLists", "uid-1");
        let update = DocumentUpdate::new()
            .union("animeIds", vec![json!(21)])
            .remove("animes", vec![json!({"id": 7})])
            .set("updatedAt", json!("2024-05-01T10:00:00.000Z"));

        let body = client().commit_body(&path, &update);
        let write = &body["writes"][0];
        assert_eq!(
            write["update"]["name"],
            "projects/vault-dev/databases/(default)/documents/animeLists/uid-1"
        );
        assert_eq!(write["update"]["fields"]["updatedAt"]["stringValue"], "2024-05-01T10:00:00.000Z");
        assert_eq!(write["updateMask"]["fieldPaths"], json!(["updatedAt"]));
        assert_eq!(write["currentDocument"]["exists"], json!(true));

        let transforms = write["updateTransforms"].as_array().unwrap();
        assert_eq!(transforms[0]["fieldPath"], "animeIds");
        assert_eq!(
            transforms[0]["appendMissingElements"]["values"],
            json!([{"integerValue": "21"}])
        );
        assert_eq!(transforms[1]["fieldPath"], "animes");
        assert_eq!(
            transforms[1]["removeAllFromArray"]["values"][0]["mapValue"]["fields"]["id"],
            json!({"integerValue": "7"})
        );
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("userId"), "userId");
        assert_eq!(field_path("_private"), "_private");
        assert_eq!(field_path("with-dash"), "`with-dash`");
        assert_eq!(field_path("1st"), "`1st`");
    }

    #[test]
    fn test_query_body() {
        let body = query_body("userImages", "userId", &json!("uid-1"));
        let filter = &body["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "userImages");
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(filter["value"], json!({"stringValue": "uid-1"}));
    }

    #[test]
    fn test_raw_document_key() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/userImages/AbC123",
            "createTime": "2024-05-01T10:00:00Z",
            "updateTime": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(raw.key(), "AbC123");
        assert!(raw.fields.is_empty());
    }
}
