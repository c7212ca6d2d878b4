use crate::list_item::ListItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A user's personal list, one document per user keyed by the user id.
///
/// Invariants kept by every writer:
/// - `item_ids` holds exactly the ids present in `items`
/// - no two `items` share an id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    pub user_id: String,
    #[serde(rename = "animeIds", default)]
    pub item_ids: Vec<i64>,
    #[serde(rename = "animes", default)]
    pub items: Vec<ListItem>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserList {
    pub const COLLECTION: &'static str = "animeLists";
    pub const FIELD_ITEM_IDS: &'static str = "animeIds";
    pub const FIELD_ITEMS: &'static str = "animes";
    pub const FIELD_UPDATED_AT: &'static str = "updatedAt";

    /// The document written the first time a signed-in user is seen
    pub fn empty(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            item_ids: Vec::new(),
            items: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.item_ids.contains(&id)
    }

    pub fn item(&self, id: i64) -> Option<&ListItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn id_set(&self) -> HashSet<i64> {
        self.item_ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the id set and the records agree and no id is stored twice
    pub fn is_consistent(&self) -> bool {
        let record_ids: HashSet<i64> = self.items.iter().map(|item| item.id).collect();
        record_ids.len() == self.items.len() && record_ids == self.id_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_value(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "title": {"romaji": format!("Title {}", id), "english": null},
            "coverImage": "",
            "status": "RELEASING",
            "episodes": null,
            "season": null,
            "seasonYear": null,
            "duration": null,
            "startDate": null,
            "endDate": null,
            "studio": null,
            "description": "",
            "addedAt": "2024-05-01T10:00:00.000Z"
        })
    }

    #[test]
    fn test_empty_list_document_shape() {
        let now = crate::timestamp::parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        let value = serde_json::to_value(UserList::empty("uid-1", now)).unwrap();
        assert_eq!(
            value,
            json!({
                "userId": "uid-1",
                "animeIds": [],
                "animes": [],
                "createdAt": "2024-05-01T10:00:00.000Z",
                "updatedAt": "2024-05-01T10:00:00.000Z"
            })
        );
    }

    #[test]
    fn test_missing_arrays_read_as_empty() {
        let list: UserList = serde_json::from_value(json!({"userId": "uid-1"})).unwrap();
        assert!(list.is_empty());
        assert!(list.is_consistent());
        assert!(list.created_at.is_none());
    }

    #[test]
    fn test_consistency_checks() {
        let mut list: UserList = serde_json::from_value(json!({
            "userId": "uid-1",
            "animeIds": [101, 202],
            "animes": [item_value(101), item_value(202)]
        }))
        .unwrap();
        assert!(list.is_consistent());
        assert!(list.contains(202));
        assert_eq!(list.item(101).unwrap().title.romaji, "Title 101");

        list.item_ids.push(303);
        assert!(!list.is_consistent());

        list.item_ids.pop();
        list.items.push(list.items[0].clone());
        assert!(!list.is_consistent());
    }
}
