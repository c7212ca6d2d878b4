//! Synchronized list store.
//!
//! Keeps a local, read-only mirror of the signed-in user's list document and
//! keeps it current through a live subscription. Mutations go straight to
//! the backend as atomic array updates; the mirror changes only when the
//! subscription delivers the committed document.
//!
//! Single-writer rule: the mirror lives behind a `watch` channel whose sender
//! is owned by the store's driver task. Nothing else can write it.
//!
//! Adds this store has committed but not yet seen delivered are tracked in a
//! private pending set, so a second add of the same id in that window is a
//! no-op. The pending set never feeds `is_in_list`.

use crate::error::ListError;
use anime_list_models::timestamp::iso_timestamp;
use anime_list_models::{CatalogMedia, ListItem, UserId, UserList};
use anime_list_sources::{
    Document, DocumentPath, DocumentStore, DocumentUpdate, IdentityProvider, Snapshot, Subscription,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No user; mirror empty; no subscription
    Unauthenticated,
    /// User known; ensuring the document exists and attaching the subscription
    Initializing,
    /// Subscription attached; deliveries replace the mirror
    Synchronized,
    /// A read, write or subscription failed; the mirror is kept as it was
    Errored,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Unauthenticated => "unauthenticated",
            SyncPhase::Initializing => "initializing",
            SyncPhase::Synchronized => "synchronized",
            SyncPhase::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// An update was committed remotely
    Applied,
    /// Nothing to do; no write was issued
    Unchanged,
}

/// Published state of the store
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub phase: SyncPhase,
    pub user_id: Option<UserId>,
    pub items: Vec<ListItem>,
    pub item_ids: BTreeSet<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Deliveries applied since the store last entered `Initializing`
    pub deliveries: u64,
}

impl ListState {
    fn signed_out() -> Self {
        Self {
            phase: SyncPhase::Unauthenticated,
            user_id: None,
            items: Vec::new(),
            item_ids: BTreeSet::new(),
            updated_at: None,
            error: None,
            deliveries: 0,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.item_ids.contains(&id)
    }

    /// Signed out, failed, or holding a delivered document
    pub fn is_settled(&self) -> bool {
        match self.phase {
            SyncPhase::Unauthenticated | SyncPhase::Errored => true,
            SyncPhase::Synchronized => self.deliveries > 0,
            SyncPhase::Initializing => false,
        }
    }

    fn clear_mirror(&mut self) {
        self.items.clear();
        self.item_ids.clear();
        self.updated_at = None;
    }
}

/// Key of a user's list document
pub fn list_path(user_id: &UserId) -> DocumentPath {
    DocumentPath::new(UserList::COLLECTION, user_id.as_str())
}

enum Control {
    Resync,
    /// A mutation failed; the subscription stays attached
    WriteFailed(String),
}

/// Adds committed by this store that no delivery has confirmed yet
#[derive(Debug, Default)]
struct PendingAdds {
    user_id: Option<UserId>,
    /// Anime id to the `updatedAt` the add wrote
    adds: BTreeMap<i64, DateTime<Utc>>,
}

impl PendingAdds {
    fn for_user(&mut self, user_id: &UserId) -> &mut BTreeMap<i64, DateTime<Utc>> {
        if self.user_id.as_ref() != Some(user_id) {
            self.user_id = Some(user_id.clone());
            self.adds.clear();
        }
        &mut self.adds
    }

    /// Drop the adds a delivered list accounts for: the id is present, or the
    /// list was written after the add
    fn settle(&mut self, list: &UserList) {
        if self.user_id.as_ref().map(UserId::as_str) != Some(list.user_id.as_str()) {
            return;
        }
        self.adds.retain(|id, written_at| {
            !list.item_ids.contains(id) && list.updated_at.map_or(true, |at| at < *written_at)
        });
    }

    fn clear(&mut self) {
        self.user_id = None;
        self.adds.clear();
    }
}

fn lock(pending: &Mutex<PendingAdds>) -> MutexGuard<'_, PendingAdds> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ListStore {
    documents: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Receiver<ListState>,
    control: mpsc::UnboundedSender<Control>,
    pending: Arc<Mutex<PendingAdds>>,
    driver: JoinHandle<()>,
}

impl ListStore {
    /// Start the store. Must be called from within a Tokio runtime.
    pub fn new(documents: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let mut initial = ListState::signed_out();
        if let Some(user_id) = identity.current_user_id() {
            initial.phase = SyncPhase::Initializing;
            initial.user_id = Some(user_id);
        }
        let (state_tx, state) = watch::channel(initial);
        let (control, control_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(PendingAdds::default()));

        let driver = Driver {
            documents: documents.clone(),
            identity: identity.clone(),
            state: state_tx,
            pending: pending.clone(),
        };
        let driver = tokio::spawn(driver.run(control_rx));

        Self {
            documents,
            identity,
            state,
            control,
            pending,
            driver,
        }
    }

    pub fn state(&self) -> ListState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ListState> {
        self.state.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.borrow().phase
    }

    pub fn items(&self) -> Vec<ListItem> {
        self.state.borrow().items.clone()
    }

    pub fn item_ids(&self) -> BTreeSet<i64> {
        self.state.borrow().item_ids.clone()
    }

    /// Membership against the mirror; never touches the backend
    pub fn is_in_list(&self, id: i64) -> bool {
        self.state.borrow().contains(id)
    }

    /// Wait until the store is signed out, errored, or holding a delivered document
    pub async fn ready(&self) -> ListState {
        let mut state = self.state.clone();
        let settled = state.wait_for(ListState::is_settled).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Re-run initialization for the current user (e.g. after an error)
    pub fn resync(&self) {
        let _ = self.control.send(Control::Resync);
    }

    /// Add a snapshot of `media` to the signed-in user's list.
    ///
    /// Ids already in the mirror, or already added by this store and not yet
    /// delivered, are a no-op. The mirror is not touched; it picks up the
    /// change from the next delivery.
    pub async fn add_item(&self, media: &CatalogMedia) -> Result<Mutation, ListError> {
        let user_id = self.identity.current_user_id().ok_or(ListError::NotAuthenticated)?;
        if self.mirror_contains(&user_id, media.id) {
            debug!(user_id = %user_id, anime_id = media.id, "already in list");
            return Ok(Mutation::Unchanged);
        }

        let now = Utc::now();
        if !self.reserve(&user_id, media.id, now) {
            debug!(user_id = %user_id, anime_id = media.id, "add already pending");
            return Ok(Mutation::Unchanged);
        }
        self.recover();

        let update = match serde_json::to_value(ListItem::snapshot(media, now)) {
            Ok(record) => DocumentUpdate::new()
                .union(UserList::FIELD_ITEM_IDS, vec![json!(media.id)])
                .union(UserList::FIELD_ITEMS, vec![record])
                .set(UserList::FIELD_UPDATED_AT, json!(iso_timestamp(&now))),
            Err(err) => {
                self.release(&user_id, media.id);
                return Err(err.into());
            }
        };

        if let Err(err) = self.commit(&user_id, update).await {
            self.release(&user_id, media.id);
            return Err(err);
        }
        info!(user_id = %user_id, anime_id = media.id, "added to list");
        Ok(Mutation::Applied)
    }

    /// Remove `id` from the signed-in user's list.
    ///
    /// The stored record is looked up with a point read and removed by value.
    /// If another client replaces that record between the read and the
    /// update, the value no longer matches and the record stays.
    pub async fn remove_item(&self, id: i64) -> Result<Mutation, ListError> {
        let user_id = self.identity.current_user_id().ok_or(ListError::NotAuthenticated)?;
        if self.mirror_is_current(&user_id) && !self.is_in_list(id) && !self.is_pending(&user_id, id) {
            debug!(user_id = %user_id, anime_id = id, "not in list");
            return Ok(Mutation::Unchanged);
        }
        self.recover();

        let path = list_path(&user_id);
        let document = match self.documents.get(&path).await {
            Ok(document) => document,
            Err(err) => return Err(self.report(ListError::remote(err))),
        };
        let Some(document) = document else {
            return Ok(Mutation::Unchanged);
        };

        let listed = document
            .get(UserList::FIELD_ITEM_IDS)
            .and_then(Value::as_array)
            .map_or(false, |ids| ids.iter().any(|v| v.as_i64() == Some(id)));
        let record = stored_record(&document, id);
        if !listed && record.is_none() {
            return Ok(Mutation::Unchanged);
        }

        let mut update = DocumentUpdate::new()
            .remove(UserList::FIELD_ITEM_IDS, vec![json!(id)])
            .set(UserList::FIELD_UPDATED_AT, json!(iso_timestamp(&Utc::now())));
        if let Some(record) = record {
            update = update.remove(UserList::FIELD_ITEMS, vec![record]);
        }

        self.commit(&user_id, update).await?;
        self.release(&user_id, id);
        info!(user_id = %user_id, anime_id = id, "removed from list");
        Ok(Mutation::Applied)
    }

    async fn commit(&self, user_id: &UserId, update: DocumentUpdate) -> Result<(), ListError> {
        self.documents
            .update(&list_path(user_id), update)
            .await
            .map_err(|err| self.report(ListError::remote(err)))
    }

    /// Log a failed mutation and record it on the published state
    fn report(&self, err: ListError) -> ListError {
        error!(error = %err, "list update failed");
        let _ = self.control.send(Control::WriteFailed(err.to_string()));
        err
    }

    /// A mutation retried on an errored store re-initializes it
    fn recover(&self) {
        if self.phase() == SyncPhase::Errored {
            debug!("mutation on errored list store; resynchronizing");
            self.resync();
        }
    }

    /// Claim `id` as a pending add; false when one is already in flight
    fn reserve(&self, user_id: &UserId, id: i64, at: DateTime<Utc>) -> bool {
        match lock(&self.pending).for_user(user_id).entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        }
    }

    fn release(&self, user_id: &UserId, id: i64) {
        lock(&self.pending).for_user(user_id).remove(&id);
    }

    fn is_pending(&self, user_id: &UserId, id: i64) -> bool {
        lock(&self.pending).for_user(user_id).contains_key(&id)
    }

    /// The mirror belongs to this user and is not waiting on a first delivery
    fn mirror_is_current(&self, user_id: &UserId) -> bool {
        let state = self.state.borrow();
        state.user_id.as_ref() == Some(user_id) && state.is_settled()
    }

    fn mirror_contains(&self, user_id: &UserId, id: i64) -> bool {
        let state = self.state.borrow();
        state.user_id.as_ref() == Some(user_id) && state.contains(id)
    }
}

impl Drop for ListStore {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// The raw stored element of `animes` with this id, exactly as the backend holds it
fn stored_record(document: &Document, id: i64) -> Option<Value> {
    document
        .get(UserList::FIELD_ITEMS)
        .and_then(Value::as_array)?
        .iter()
        .find(|record| record.get("id").and_then(Value::as_i64) == Some(id))
        .cloned()
}

fn decode_list(document: Document) -> Result<UserList, ListError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

async fn next_delivery(subscription: &mut Option<Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

struct Driver {
    documents: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Sender<ListState>,
    pending: Arc<Mutex<PendingAdds>>,
}

impl Driver {
    async fn run(self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut users = self.identity.watch_user();
        let mut user = users.borrow_and_update().clone();

        loop {
            // Dropped at the end of each pass, so the old subscription is
            // released before a new one is attached.
            let mut subscription = match &user {
                Some(user_id) => self.initialize(user_id).await,
                None => {
                    self.sign_out();
                    None
                }
            };

            loop {
                tokio::select! {
                    changed = users.changed() => {
                        if changed.is_err() {
                            debug!("identity provider closed; list driver stopping");
                            return;
                        }
                        let next = users.borrow_and_update().clone();
                        // Same user re-announced while healthy: nothing to redo
                        if next == user && subscription.is_some() {
                            continue;
                        }
                        user = next;
                        break;
                    }
                    command = control.recv() => match command {
                        Some(Control::Resync) => break,
                        Some(Control::WriteFailed(message)) => {
                            self.state.send_modify(|state| state.error = Some(message));
                        }
                        None => return,
                    },
                    delivery = next_delivery(&mut subscription) => match delivery {
                        Some(Ok(document)) => {
                            if let Err(err) = self.apply(document) {
                                error!(error = %err, "could not read delivered list");
                                subscription = None;
                                self.fail(err.to_string());
                            }
                        }
                        Some(Err(err)) => {
                            let err = ListError::Subscription(err.to_string());
                            error!(error = %err, "live list subscription failed");
                            subscription = None;
                            self.fail(err.to_string());
                        }
                        None => {
                            let err = ListError::Subscription("subscription closed".to_string());
                            warn!(error = %err, "live list subscription ended");
                            subscription = None;
                            self.fail(err.to_string());
                        }
                    },
                }
            }
        }
    }

    async fn initialize(&self, user_id: &UserId) -> Option<Subscription> {
        lock(&self.pending).for_user(user_id);
        self.state.send_modify(|state| {
            if state.user_id.as_ref() != Some(user_id) {
                state.clear_mirror();
            }
            state.user_id = Some(user_id.clone());
            state.phase = SyncPhase::Initializing;
            state.deliveries = 0;
        });
        info!(user_id = %user_id, phase = %SyncPhase::Initializing, "synchronizing list");

        match self.attach(user_id).await {
            Ok(subscription) => {
                self.state.send_modify(|state| {
                    state.phase = SyncPhase::Synchronized;
                    state.error = None;
                });
                debug!(user_id = %user_id, phase = %SyncPhase::Synchronized, "list subscription attached");
                Some(subscription)
            }
            Err(err) => {
                error!(user_id = %user_id, error = %err, "list initialization failed");
                self.fail(err.to_string());
                None
            }
        }
    }

    /// Make sure the document exists, then open the live subscription
    async fn attach(&self, user_id: &UserId) -> Result<Subscription, ListError> {
        let path = list_path(user_id);
        let existing = self.documents.get(&path).await.map_err(ListError::remote)?;
        if existing.is_none() {
            let empty = UserList::empty(user_id.as_str(), Utc::now());
            let document = match serde_json::to_value(&empty)? {
                Value::Object(document) => document,
                _ => return Err(ListError::Decode("list did not serialize to a map".to_string())),
            };
            self.documents
                .set(&path, document)
                .await
                .map_err(ListError::remote)?;
            info!(user_id = %user_id, "created empty list");
        }
        self.documents.subscribe(&path).await.map_err(ListError::remote)
    }

    fn apply(&self, document: Option<Document>) -> Result<(), ListError> {
        let list = document.map(decode_list).transpose()?;
        match &list {
            Some(list) => {
                if !list.is_consistent() {
                    warn!(user_id = %list.user_id, "list ids and records disagree");
                }
                lock(&self.pending).settle(list);
            }
            None => lock(&self.pending).adds.clear(),
        }

        self.state.send_modify(|state| {
            match list {
                Some(list) => {
                    state.item_ids = list.item_ids.iter().copied().collect();
                    state.items = list.items;
                    state.updated_at = list.updated_at;
                }
                None => state.clear_mirror(),
            }
            state.phase = SyncPhase::Synchronized;
            state.error = None;
            state.deliveries += 1;
        });
        debug!(items = self.state.borrow().items.len(), "list delivery applied");
        Ok(())
    }

    fn fail(&self, message: String) {
        self.state.send_modify(|state| {
            state.phase = SyncPhase::Errored;
            state.error = Some(message);
        });
    }

    fn sign_out(&self) {
        lock(&self.pending).clear();
        self.state.send_replace(ListState::signed_out());
        debug!(phase = %SyncPhase::Unauthenticated, "list cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_stored_record_finds_exact_element() {
        let doc = document(json!({
            "animes": [{"id": 1, "addedAt": "a"}, {"id": 2, "addedAt": "b"}]
        }));
        assert_eq!(stored_record(&doc, 2), Some(json!({"id": 2, "addedAt": "b"})));
        assert_eq!(stored_record(&doc, 3), None);
        assert_eq!(stored_record(&Document::new(), 1), None);
    }

    #[test]
    fn test_settled_states() {
        let mut state = ListState::signed_out();
        assert!(state.is_settled());
        state.phase = SyncPhase::Initializing;
        assert!(!state.is_settled());
        state.phase = SyncPhase::Synchronized;
        assert!(!state.is_settled());
        state.deliveries = 1;
        assert!(state.is_settled());
        state.phase = SyncPhase::Errored;
        assert!(state.is_settled());
    }

    #[test]
    fn test_decode_list_rejects_bad_shape() {
        let err = decode_list(document(json!({"userId": "u", "animeIds": "nope"}))).unwrap_err();
        assert!(matches!(err, ListError::Decode(_)));
    }
}
