use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded image plus the metadata document that points at it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    /// Document key in the `userImages` collection (not stored in the document itself)
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
}

impl GalleryImage {
    pub const COLLECTION: &'static str = "userImages";
    pub const FIELD_USER_ID: &'static str = "userId";

    /// Object-store path for an upload: `user-images/{uid}/{millis}-{file_name}`
    pub fn storage_path_for(user_id: &str, uploaded_at: DateTime<Utc>, file_name: &str) -> String {
        format!(
            "user-images/{}/{}-{}",
            user_id,
            uploaded_at.timestamp_millis(),
            file_name
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_path_for() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            GalleryImage::storage_path_for("uid-9", at, "poster.png"),
            "user-images/uid-9/1700000000123-poster.png"
        );
    }

    #[test]
    fn test_id_is_not_part_of_document() {
        let image = GalleryImage {
            id: "doc-1".to_string(),
            user_id: "uid-9".to_string(),
            image_url: "https://example/img".to_string(),
            storage_path: None,
            created_at: None,
            file_type: "image/png".to_string(),
            file_name: "a.png".to_string(),
            file_size: 12,
        };
        let value = serde_json::to_value(&image).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["userId"], "uid-9");
        assert_eq!(value["fileSize"], 12);
    }
}
