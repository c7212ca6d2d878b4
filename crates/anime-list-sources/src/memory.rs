//! In-process backends with the same semantics as the hosted services.
//!
//! Besides embedding, these are the test doubles for the list store and the
//! gallery: the document store can be taken offline, can refuse or break live
//! subscriptions, can hold deliveries back, and counts every remote call.

use crate::document::{Document, DocumentPath, DocumentUpdate, Snapshot, StoredDocument, Subscription};
use crate::error::{SourceError, SourceResult};
use crate::traits::{DocumentStore, IdentityProvider, ObjectStore, StoredObject};
use anime_list_models::UserId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Per-operation call counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub set: usize,
    pub update: usize,
    pub subscribe: usize,
    pub add: usize,
    pub query: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get + self.set + self.update + self.subscribe + self.add + self.query + self.delete
    }

    pub fn writes(&self) -> usize {
        self.set + self.update + self.add + self.delete
    }
}

struct Watcher {
    id: u64,
    path: DocumentPath,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct StoreState {
    documents: HashMap<DocumentPath, Document>,
    watchers: Vec<Watcher>,
    held: Vec<(u64, Snapshot)>,
    next_watcher_id: u64,
    next_key: u64,
    calls: CallCounts,
    offline: bool,
    refuse_subscriptions: bool,
    holding: bool,
}

impl StoreState {
    fn deliver(&mut self, path: &DocumentPath) {
        let snapshot = self.documents.get(path).cloned();
        let targets: Vec<u64> = self
            .watchers
            .iter()
            .filter(|w| &w.path == path)
            .map(|w| w.id)
            .collect();
        for id in targets {
            self.send(id, Ok(snapshot.clone()));
        }
    }

    fn send(&mut self, watcher_id: u64, snapshot: Snapshot) {
        if self.holding {
            self.held.push((watcher_id, snapshot));
            return;
        }
        if let Some(watcher) = self.watchers.iter().find(|w| w.id == watcher_id) {
            if watcher.sender.send(snapshot).is_err() {
                self.watchers.retain(|w| w.id != watcher_id);
            }
        }
    }

    fn check_online(&self) -> SourceResult<()> {
        if self.offline {
            return Err(SourceError::Unavailable("document store is offline".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<StoreState>>,
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails with `Unavailable` until brought back online
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    /// New subscriptions fail to attach while set
    pub fn refuse_subscriptions(&self, refuse: bool) {
        lock(&self.state).refuse_subscriptions = refuse;
    }

    /// Push a failure to every live subscription and close them
    pub fn break_subscriptions(&self) {
        let mut state = lock(&self.state);
        for watcher in state.watchers.drain(..) {
            let _ = watcher
                .sender
                .send(Err(SourceError::Unavailable("live connection lost".to_string())));
        }
    }

    /// Queue deliveries instead of sending them
    pub fn hold_deliveries(&self) {
        lock(&self.state).holding = true;
    }

    /// Send every queued delivery in order and stop holding
    pub fn release_deliveries(&self) {
        let mut state = lock(&self.state);
        state.holding = false;
        let held = std::mem::take(&mut state.held);
        for (watcher_id, snapshot) in held {
            state.send(watcher_id, snapshot);
        }
    }

    pub fn calls(&self) -> CallCounts {
        lock(&self.state).calls.clone()
    }

    pub fn reset_calls(&self) {
        lock(&self.state).calls = CallCounts::default();
    }

    /// Inspect stored state without counting a call
    pub fn peek(&self, path: &DocumentPath) -> Option<Document> {
        lock(&self.state).documents.get(path).cloned()
    }

    /// Write as another client would: uncounted, but delivered to subscribers
    pub fn put(&self, path: &DocumentPath, document: Document) {
        let mut state = lock(&self.state);
        state.documents.insert(path.clone(), document);
        state.deliver(path);
    }

    pub fn subscriber_count(&self, path: &DocumentPath) -> usize {
        lock(&self.state)
            .watchers
            .iter()
            .filter(|w| &w.path == path && !w.sender.is_closed())
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> SourceResult<Option<Document>> {
        let mut state = lock(&self.state);
        state.calls.get += 1;
        state.check_online()?;
        Ok(state.documents.get(path).cloned())
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> SourceResult<()> {
        let mut state = lock(&self.state);
        state.calls.set += 1;
        state.check_online()?;
        state.documents.insert(path.clone(), document);
        state.deliver(path);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> SourceResult<()> {
        let mut state = lock(&self.state);
        state.calls.update += 1;
        state.check_online()?;
        let document = state
            .documents
            .get_mut(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;
        update.apply(document);
        state.deliver(path);
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> SourceResult<Subscription> {
        let mut state = lock(&self.state);
        state.calls.subscribe += 1;
        state.check_online()?;
        if state.refuse_subscriptions {
            return Err(SourceError::Unavailable("subscription refused".to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = state.next_watcher_id;
        state.next_watcher_id += 1;
        state.watchers.push(Watcher {
            id,
            path: path.clone(),
            sender,
        });
        let current = state.documents.get(path).cloned();
        state.send(id, Ok(current));
        debug!(path = %path, watcher = id, "memory subscription attached");

        let weak: Weak<Mutex<StoreState>> = Arc::downgrade(&self.state);
        Ok(Subscription::new(receiver, move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).watchers.retain(|w| w.id != id);
            }
        }))
    }

    async fn add(&self, collection: &str, document: Document) -> SourceResult<String> {
        let mut state = lock(&self.state);
        state.calls.add += 1;
        state.check_online()?;
        state.next_key += 1;
        let key = format!("mem-{:06}", state.next_key);
        let path = DocumentPath::new(collection, key.clone());
        state.documents.insert(path.clone(), document);
        state.deliver(&path);
        Ok(key)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> SourceResult<Vec<StoredDocument>> {
        let mut state = lock(&self.state);
        state.calls.query += 1;
        state.check_online()?;
        let mut matches: Vec<StoredDocument> = state
            .documents
            .iter()
            .filter(|(path, doc)| path.collection() == collection && doc.get(field) == Some(&value))
            .map(|(path, doc)| StoredDocument {
                id: path.id().to_string(),
                data: doc.clone(),
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    async fn delete(&self, path: &DocumentPath) -> SourceResult<()> {
        let mut state = lock(&self.state);
        state.calls.delete += 1;
        state.check_online()?;
        if state.documents.remove(path).is_some() {
            state.deliver(path);
        }
        Ok(())
    }
}

#[derive(Default)]
struct ObjectState {
    objects: HashMap<String, (Vec<u8>, String)>,
    calls: usize,
    offline: bool,
}

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<ObjectState>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Content type recorded for an object
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.lock().objects.get(path).map(|(_, content_type)| content_type.clone())
    }

    fn lock(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> SourceResult<StoredObject> {
        let mut state = self.lock();
        state.calls += 1;
        if state.offline {
            return Err(SourceError::Unavailable("object store is offline".to_string()));
        }
        let size = bytes.len() as u64;
        state
            .objects
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(StoredObject {
            path: path.to_string(),
            download_url: format!("memory://{}", path),
            size,
        })
    }

    async fn delete(&self, path: &str) -> SourceResult<()> {
        let mut state = self.lock();
        state.calls += 1;
        if state.offline {
            return Err(SourceError::Unavailable("object store is offline".to_string()));
        }
        state
            .objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }
}

/// Identity provider driven directly by the embedding code
pub struct LocalIdentity {
    user: watch::Sender<Option<UserId>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        Self { user }
    }

    pub fn signed_in(user_id: impl Into<UserId>) -> Self {
        let identity = Self::new();
        identity.sign_in(user_id);
        identity
    }

    pub fn sign_in(&self, user_id: impl Into<UserId>) {
        self.user.send_replace(Some(user_id.into()));
    }

    pub fn sign_out(&self) {
        self.user.send_replace(None);
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<UserId>> {
        self.user.subscribe()
    }
}
