//! Document-store vocabulary shared by every backend: paths, schemaless
//! documents, atomic field updates and live subscriptions.

use crate::error::SourceError;
use futures::Stream;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A schemaless document body
pub type Document = serde_json::Map<String, Value>;

/// One live-subscription delivery: the current document, or `None` once it no longer exists
pub type Snapshot = Result<Option<Document>, SourceError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document returned by a query, with its key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

/// Atomic, field-level change applied to an existing document.
///
/// Array unions append only values not already present; array removals drop
/// every element equal (by value) to one of the given values. Both leave the
/// rest of the array untouched, so concurrent writers do not clobber each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub array_union: Vec<(String, Vec<Value>)>,
    pub array_remove: Vec<(String, Vec<Value>)>,
    pub set: Vec<(String, Value)>,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.array_union.push((field.into(), values));
        self
    }

    pub fn remove(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.array_remove.push((field.into(), values));
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.push((field.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.array_union.is_empty() && self.array_remove.is_empty() && self.set.is_empty()
    }

    /// Apply locally with the same semantics the hosted store uses
    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            document.insert(field.clone(), value.clone());
        }

        for (field, values) in &self.array_union {
            let entry = document
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(existing) = entry {
                for value in values {
                    if !existing.contains(value) {
                        existing.push(value.clone());
                    }
                }
            }
        }

        for (field, values) in &self.array_remove {
            match document.get_mut(field) {
                Some(Value::Array(existing)) => existing.retain(|item| !values.contains(item)),
                _ => {
                    document.insert(field.clone(), Value::Array(Vec::new()));
                }
            }
        }
    }
}

struct CancelGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

/// Live view of one document.
///
/// Every change to the document is pushed as a [`Snapshot`]. Dropping the
/// subscription unsubscribes from the backend.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    _guard: CancelGuard,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            _guard: CancelGuard(Some(Box::new(on_cancel))),
        }
    }

    /// Next delivery, or `None` when the backend closed the subscription
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_union_skips_present_values() {
        let mut document = doc(json!({"ids": [1, 2]}));
        DocumentUpdate::new()
            .union("ids", vec![json!(2), json!(3)])
            .apply(&mut document);
        assert_eq!(document["ids"], json!([1, 2, 3]));
    }

    #[test]
    fn test_remove_matches_by_value() {
        let mut document = doc(json!({
            "records": [{"id": 1, "v": "a"}, {"id": 2, "v": "b"}]
        }));
        DocumentUpdate::new()
            .remove("records", vec![json!({"id": 1, "v": "stale"})])
            .apply(&mut document);
        assert_eq!(document["records"].as_array().unwrap().len(), 2);

        DocumentUpdate::new()
            .remove("records", vec![json!({"id": 1, "v": "a"})])
            .apply(&mut document);
        assert_eq!(document["records"], json!([{"id": 2, "v": "b"}]));
    }

    #[test]
    fn test_missing_fields_become_arrays() {
        let mut document = Document::new();
        DocumentUpdate::new()
            .union("added", vec![json!(7)])
            .remove("removed", vec![json!(7)])
            .set("updatedAt", json!("2024-01-01T00:00:00.000Z"))
            .apply(&mut document);
        assert_eq!(document["added"], json!([7]));
        assert_eq!(document["removed"], json!([]));
        assert_eq!(document["updatedAt"], json!("2024-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_subscription_cancels_on_drop() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscription = Subscription::new(rx, move || flag.store(true, Ordering::SeqCst));

        tx.send(Ok(None)).unwrap();
        assert!(matches!(subscription.next().await, Some(Ok(None))));
        assert!(!cancelled.load(Ordering::SeqCst));

        drop(subscription);
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
