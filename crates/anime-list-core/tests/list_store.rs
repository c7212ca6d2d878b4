use anime_list_core::{list_path, ListError, ListState, ListStore, Mutation, SyncPhase};
use anime_list_models::{CatalogMedia, ListItem, UserId, UserList};
use anime_list_sources::{
    Document, DocumentPath, DocumentStore, DocumentUpdate, IdentityProvider, LocalIdentity,
    MemoryDocumentStore, SourceResult, StoredDocument, Subscription,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn media(id: i64) -> CatalogMedia {
    serde_json::from_value(json!({
        "id": id,
        "title": {"romaji": format!("Anime {}", id), "english": null},
        "description": "<p>Synopsis</p>",
        "coverImage": {"medium": "m.jpg", "large": format!("https://img.example/{}.jpg", id)},
        "status": "FINISHED",
        "episodes": 12,
        "studios": {"nodes": [{"id": 1, "name": "Studio One"}, {"id": 2, "name": "Studio Two"}]},
        "startDate": {"year": 2020, "month": 1, "day": 10}
    }))
    .unwrap()
}

/// A list document as another client would have written it
fn list_document(user: &str, ids: &[i64]) -> Document {
    let added_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut list = UserList::empty(user, added_at);
    for id in ids {
        list.item_ids.push(*id);
        list.items.push(ListItem::snapshot(&media(*id), added_at));
    }
    match serde_json::to_value(list).unwrap() {
        Value::Object(document) => document,
        _ => unreachable!(),
    }
}

fn stored(documents: &MemoryDocumentStore, user: &str) -> UserList {
    let document = documents.peek(&list_path(&UserId::new(user))).expect("list document exists");
    serde_json::from_value(Value::Object(document)).unwrap()
}

async fn wait_until(store: &ListStore, predicate: impl FnMut(&ListState) -> bool) -> ListState {
    let mut state = store.watch_state();
    let result = tokio::time::timeout(WAIT, state.wait_for(predicate)).await;
    let settled = result.expect("timed out waiting for list state").unwrap().clone();
    settled
}

async fn wait_for_subscribers(documents: &MemoryDocumentStore, path: &DocumentPath, count: usize) {
    tokio::time::timeout(WAIT, async {
        while documents.subscriber_count(path) != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for subscriber count");
}

struct Harness {
    documents: MemoryDocumentStore,
    identity: Arc<LocalIdentity>,
    store: ListStore,
}

impl Harness {
    fn new(documents: MemoryDocumentStore, identity: LocalIdentity) -> Self {
        let identity = Arc::new(identity);
        let store = ListStore::new(Arc::new(documents.clone()), identity.clone());
        Self {
            documents,
            identity,
            store,
        }
    }

    /// Signed in as `user` with the given ids already stored, synchronized
    async fn synchronized(user: &str, ids: &[i64]) -> Self {
        let documents = MemoryDocumentStore::new();
        documents.put(&list_path(&UserId::new(user)), list_document(user, ids));
        let harness = Self::new(documents, LocalIdentity::signed_in(user));
        let state = harness.store.ready().await;
        assert_eq!(state.phase, SyncPhase::Synchronized);
        harness
    }
}

#[tokio::test]
async fn first_sign_in_creates_empty_list() {
    let harness = Harness::new(MemoryDocumentStore::new(), LocalIdentity::signed_in("uid-1"));
    let state = harness.store.ready().await;

    assert_eq!(state.phase, SyncPhase::Synchronized);
    assert_eq!(state.user_id, Some(UserId::new("uid-1")));
    assert!(state.items.is_empty());

    let list = stored(&harness.documents, "uid-1");
    assert_eq!(list.user_id, "uid-1");
    assert!(list.is_empty());
    assert!(list.created_at.is_some());
    assert_eq!(harness.documents.calls().set, 1);
}

#[tokio::test]
async fn existing_list_is_not_overwritten() {
    let harness = Harness::synchronized("uid-1", &[101, 202]).await;
    assert_eq!(harness.documents.calls().set, 0);
    assert_eq!(harness.store.item_ids().into_iter().collect::<Vec<_>>(), vec![101, 202]);
    assert!(harness.store.is_in_list(202));
}

#[tokio::test]
async fn add_to_empty_list() {
    let harness = Harness::synchronized("uid-1", &[]).await;

    let outcome = harness.store.add_item(&media(101)).await.unwrap();
    assert_eq!(outcome, Mutation::Applied);

    let list = stored(&harness.documents, "uid-1");
    assert_eq!(list.item_ids, vec![101]);
    assert_eq!(list.items.len(), 1);
    let record = &list.items[0];
    assert_eq!(record.id, 101);
    assert_eq!(record.cover_image, "https://img.example/101.jpg");
    assert_eq!(record.studio.as_deref(), Some("Studio One"));
    assert!(list.updated_at > list.created_at);

    let state = wait_until(&harness.store, |s| s.contains(101)).await;
    assert_eq!(state.items.len(), 1);
}

#[tokio::test]
async fn adding_a_listed_id_is_a_no_op() {
    let harness = Harness::synchronized("uid-1", &[101, 202]).await;
    let before = stored(&harness.documents, "uid-1");
    harness.documents.reset_calls();

    let outcome = harness.store.add_item(&media(101)).await.unwrap();

    assert_eq!(outcome, Mutation::Unchanged);
    assert_eq!(harness.documents.calls().total(), 0);
    assert_eq!(stored(&harness.documents, "uid-1"), before);
}

#[tokio::test]
async fn repeated_add_keeps_cardinality() {
    let harness = Harness::synchronized("uid-1", &[]).await;

    harness.store.add_item(&media(7)).await.unwrap();
    wait_until(&harness.store, |s| s.contains(7)).await;
    let second = harness.store.add_item(&media(7)).await.unwrap();

    assert_eq!(second, Mutation::Unchanged);
    let list = stored(&harness.documents, "uid-1");
    assert_eq!(list.item_ids.len(), 1);
    assert_eq!(list.items.len(), 1);
}

#[tokio::test]
async fn remove_listed_item() {
    let harness = Harness::synchronized("uid-1", &[101]).await;

    let outcome = harness.store.remove_item(101).await.unwrap();
    assert_eq!(outcome, Mutation::Applied);

    let list = stored(&harness.documents, "uid-1");
    assert!(list.item_ids.is_empty());
    assert!(list.items.is_empty());

    let state = wait_until(&harness.store, |s| !s.contains(101)).await;
    assert!(state.items.is_empty());
}

#[tokio::test]
async fn removing_an_absent_id_makes_no_calls() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    let before = harness.store.state();
    harness.documents.reset_calls();

    let outcome = harness.store.remove_item(999).await.unwrap();

    assert_eq!(outcome, Mutation::Unchanged);
    assert_eq!(harness.documents.calls().total(), 0);
    assert_eq!(harness.store.state(), before);
}

#[tokio::test]
async fn mirror_waits_for_delivery() {
    let harness = Harness::synchronized("uid-1", &[]).await;
    harness.documents.hold_deliveries();

    harness.store.add_item(&media(55)).await.unwrap();
    // Committed remotely, but not delivered yet
    assert!(stored(&harness.documents, "uid-1").contains(55));
    assert!(!harness.store.is_in_list(55));

    harness.documents.release_deliveries();
    wait_until(&harness.store, |s| s.contains(55)).await;
}

#[tokio::test]
async fn signed_out_mutations_are_rejected_without_calls() {
    let harness = Harness::new(MemoryDocumentStore::new(), LocalIdentity::new());
    let state = harness.store.ready().await;
    assert_eq!(state.phase, SyncPhase::Unauthenticated);

    let add = harness.store.add_item(&media(1)).await;
    let remove = harness.store.remove_item(1).await;

    assert!(matches!(add, Err(ListError::NotAuthenticated)));
    assert!(matches!(remove, Err(ListError::NotAuthenticated)));
    assert_eq!(harness.documents.calls().total(), 0);
}

#[tokio::test]
async fn ids_and_records_stay_in_step() {
    let harness = Harness::synchronized("uid-1", &[1]).await;

    for id in [2, 3, 4] {
        harness.store.add_item(&media(id)).await.unwrap();
    }
    wait_until(&harness.store, |s| s.contains(4)).await;
    harness.store.remove_item(3).await.unwrap();
    harness.store.remove_item(1).await.unwrap();
    harness.store.add_item(&media(5)).await.unwrap();

    let list = stored(&harness.documents, "uid-1");
    assert!(list.is_consistent());
    let mut ids = list.item_ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 4, 5]);

    let state = wait_until(&harness.store, |s| s.contains(5) && !s.contains(1)).await;
    assert_eq!(state.items.len(), 3);
}

#[tokio::test]
async fn sign_out_clears_mirror_and_releases_subscription() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    let path = list_path(&UserId::new("uid-1"));
    assert_eq!(harness.documents.subscriber_count(&path), 1);

    harness.identity.sign_out();

    let state = wait_until(&harness.store, |s| s.phase == SyncPhase::Unauthenticated).await;
    assert!(state.items.is_empty());
    assert!(state.user_id.is_none());
    assert!(!harness.store.is_in_list(101));
    wait_for_subscribers(&harness.documents, &path, 0).await;
}

#[tokio::test]
async fn switching_users_swaps_the_mirror() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    harness
        .documents
        .put(&list_path(&UserId::new("uid-2")), list_document("uid-2", &[202]));

    harness.identity.sign_in("uid-2");

    let state = wait_until(&harness.store, |s| {
        s.user_id == Some(UserId::new("uid-2")) && s.is_settled()
    })
    .await;
    assert_eq!(state.item_ids.iter().copied().collect::<Vec<_>>(), vec![202]);
    wait_for_subscribers(&harness.documents, &list_path(&UserId::new("uid-1")), 0).await;
}

#[tokio::test]
async fn live_failure_keeps_mirror_and_resync_recovers() {
    let harness = Harness::synchronized("uid-1", &[101]).await;

    harness.documents.break_subscriptions();

    let state = wait_until(&harness.store, |s| s.phase == SyncPhase::Errored).await;
    assert!(state.error.is_some());
    assert!(harness.store.is_in_list(101));

    harness.store.resync();
    let state = wait_until(&harness.store, |s| {
        s.phase == SyncPhase::Synchronized && s.deliveries > 0
    })
    .await;
    assert!(state.error.is_none());
    assert!(state.contains(101));
}

#[tokio::test]
async fn failed_initialization_recovers_on_identity_event() {
    let documents = MemoryDocumentStore::new();
    documents.set_offline(true);
    let harness = Harness::new(documents, LocalIdentity::signed_in("uid-1"));

    let state = harness.store.ready().await;
    assert_eq!(state.phase, SyncPhase::Errored);

    harness.documents.set_offline(false);
    harness.identity.sign_in("uid-1");

    wait_until(&harness.store, |s| s.phase == SyncPhase::Synchronized && s.deliveries > 0).await;
    assert!(harness.documents.peek(&list_path(&UserId::new("uid-1"))).is_some());
}

#[tokio::test]
async fn refused_subscription_is_an_error() {
    let documents = MemoryDocumentStore::new();
    documents.refuse_subscriptions(true);
    let harness = Harness::new(documents, LocalIdentity::signed_in("uid-1"));

    let state = harness.store.ready().await;
    assert_eq!(state.phase, SyncPhase::Errored);
    assert!(state.error.unwrap().contains("unavailable"));
}

#[tokio::test]
async fn write_failure_keeps_mirror() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    let before = harness.store.items();
    harness.documents.set_offline(true);

    let result = harness.store.add_item(&media(202)).await;

    assert!(matches!(result, Err(ListError::RemoteUnavailable(_))));
    let state = wait_until(&harness.store, |s| s.error.is_some()).await;
    // Only the write failed; the live subscription is still attached
    assert_eq!(state.phase, SyncPhase::Synchronized);
    assert_eq!(state.items, before);
    assert!(!state.contains(202));
    assert_eq!(harness.documents.subscriber_count(&list_path(&UserId::new("uid-1"))), 1);
}

#[tokio::test]
async fn retry_after_write_failure_stores_one_record() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    harness.documents.set_offline(true);
    assert!(harness.store.add_item(&media(202)).await.is_err());
    harness.documents.set_offline(false);

    let retry = harness.store.add_item(&media(202)).await.unwrap();
    assert_eq!(retry, Mutation::Applied);
    wait_until(&harness.store, |s| s.contains(202)).await;

    let again = harness.store.add_item(&media(202)).await.unwrap();
    assert_eq!(again, Mutation::Unchanged);
    let list = stored(&harness.documents, "uid-1");
    assert_eq!(list.item_ids, vec![101, 202]);
    assert_eq!(list.items.len(), 2);
    assert!(list.is_consistent());
}

#[tokio::test]
async fn mutation_on_errored_store_resynchronizes() {
    let harness = Harness::synchronized("uid-1", &[101]).await;
    harness.documents.break_subscriptions();
    wait_until(&harness.store, |s| s.phase == SyncPhase::Errored).await;

    let outcome = harness.store.add_item(&media(202)).await.unwrap();

    assert_eq!(outcome, Mutation::Applied);
    let state = wait_until(&harness.store, |s| {
        s.phase == SyncPhase::Synchronized && s.contains(202)
    })
    .await;
    assert!(state.contains(101));
    assert_eq!(harness.documents.subscriber_count(&list_path(&UserId::new("uid-1"))), 1);
}

#[tokio::test]
async fn add_twice_before_delivery_stores_one_record() {
    let harness = Harness::synchronized("uid-1", &[]).await;
    harness.documents.hold_deliveries();

    let first = harness.store.add_item(&media(101)).await.unwrap();
    let second = harness.store.add_item(&media(101)).await.unwrap();

    assert_eq!(first, Mutation::Applied);
    assert_eq!(second, Mutation::Unchanged);
    assert!(!harness.store.is_in_list(101));
    let list = stored(&harness.documents, "uid-1");
    assert_eq!(list.item_ids, vec![101]);
    assert_eq!(list.items.len(), 1);

    harness.documents.release_deliveries();
    wait_until(&harness.store, |s| s.contains(101)).await;
}

#[tokio::test]
async fn readding_after_remove_is_applied() {
    let harness = Harness::synchronized("uid-1", &[]).await;

    harness.store.add_item(&media(5)).await.unwrap();
    wait_until(&harness.store, |s| s.contains(5)).await;
    harness.store.remove_item(5).await.unwrap();
    wait_until(&harness.store, |s| !s.contains(5)).await;

    let outcome = harness.store.add_item(&media(5)).await.unwrap();
    assert_eq!(outcome, Mutation::Applied);
    wait_until(&harness.store, |s| s.contains(5)).await;
    assert_eq!(stored(&harness.documents, "uid-1").items.len(), 1);
}

#[tokio::test]
async fn remove_of_undelivered_add_reaches_backend() {
    let harness = Harness::synchronized("uid-1", &[]).await;
    harness.documents.hold_deliveries();
    harness.store.add_item(&media(9)).await.unwrap();

    let outcome = harness.store.remove_item(9).await.unwrap();

    assert_eq!(outcome, Mutation::Applied);
    let list = stored(&harness.documents, "uid-1");
    assert!(list.item_ids.is_empty());
    assert!(list.items.is_empty());
    harness.documents.release_deliveries();
}

#[tokio::test]
async fn two_stores_for_one_user_converge() {
    let documents = MemoryDocumentStore::new();
    let first = Harness::new(documents.clone(), LocalIdentity::signed_in("uid-1"));
    first.store.ready().await;
    let second = Harness::new(documents.clone(), LocalIdentity::signed_in("uid-1"));
    second.store.ready().await;

    first.store.add_item(&media(1)).await.unwrap();
    second.store.add_item(&media(2)).await.unwrap();

    let expected = |s: &ListState| s.contains(1) && s.contains(2);
    wait_until(&first.store, expected).await;
    wait_until(&second.store, expected).await;
    assert!(stored(&documents, "uid-1").is_consistent());
}

#[tokio::test]
async fn dropping_the_store_releases_subscription() {
    let harness = Harness::synchronized("uid-1", &[]).await;
    let path = list_path(&UserId::new("uid-1"));
    let documents = harness.documents.clone();

    drop(harness);

    wait_for_subscribers(&documents, &path, 0).await;
}

/// Replaces the stored record for `id` right before forwarding the first update,
/// as a concurrent writer on another device would.
struct ConcurrentReplace {
    inner: MemoryDocumentStore,
    id: i64,
}

#[async_trait]
impl DocumentStore for ConcurrentReplace {
    async fn get(&self, path: &DocumentPath) -> SourceResult<Option<Document>> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> SourceResult<()> {
        self.inner.set(path, document).await
    }

    async fn update(&self, path: &DocumentPath, update: DocumentUpdate) -> SourceResult<()> {
        let mut document = self.inner.peek(path).unwrap_or_default();
        if let Some(Value::Array(records)) = document.get_mut("animes") {
            for record in records.iter_mut() {
                if record["id"] == json!(self.id) {
                    record["addedAt"] = json!("2030-01-01T00:00:00.000Z");
                }
            }
        }
        self.inner.put(path, document);
        self.inner.update(path, update).await
    }

    async fn subscribe(&self, path: &DocumentPath) -> SourceResult<Subscription> {
        self.inner.subscribe(path).await
    }

    async fn add(&self, collection: &str, document: Document) -> SourceResult<String> {
        self.inner.add(collection, document).await
    }

    async fn query_eq(&self, collection: &str, field: &str, value: Value) -> SourceResult<Vec<StoredDocument>> {
        self.inner.query_eq(collection, field, value).await
    }

    async fn delete(&self, path: &DocumentPath) -> SourceResult<()> {
        self.inner.delete(path).await
    }
}

#[tokio::test]
async fn remove_after_concurrent_replace_leaves_record() {
    let documents = MemoryDocumentStore::new();
    documents.put(&list_path(&UserId::new("uid-1")), list_document("uid-1", &[101]));
    let racing = Arc::new(ConcurrentReplace {
        inner: documents.clone(),
        id: 101,
    });
    let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::signed_in("uid-1"));
    let store = ListStore::new(racing, identity);
    store.ready().await;

    let outcome = store.remove_item(101).await.unwrap();

    // The id is gone but the replaced record no longer matched by value
    assert_eq!(outcome, Mutation::Applied);
    let list = stored(&documents, "uid-1");
    assert!(list.item_ids.is_empty());
    assert_eq!(list.items.len(), 1);
    assert!(!list.is_consistent());
}
