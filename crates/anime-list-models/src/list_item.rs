use crate::catalog::CatalogMedia;
use crate::media::{FuzzyDate, MediaStatus, Season};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListTitle {
    pub romaji: String,
    pub english: Option<String>,
}

/// Denormalized snapshot of a catalog entry, captured when it was added to a list.
///
/// The stored shape is the document shape: `id`, nested `title`, `coverImage`,
/// `status`, `episodes`, `season`, `seasonYear`, `duration`, `startDate`,
/// `endDate`, `studio`, `description`, `addedAt`. Nullable fields are written as
/// explicit nulls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: i64,
    pub title: ListTitle,
    #[serde(default)]
    pub cover_image: String,
    pub status: MediaStatus,
    pub episodes: Option<u32>,
    pub season: Option<Season>,
    pub season_year: Option<i32>,
    pub duration: Option<u32>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub studio: Option<String>, // First studio only
    #[serde(default)]
    pub description: String, // May contain HTML
    #[serde(with = "crate::timestamp")]
    pub added_at: DateTime<Utc>,
}

impl ListItem {
    /// Capture the fields of a full catalog record at `added_at`.
    ///
    /// The snapshot is never refreshed afterwards.
    pub fn snapshot(media: &CatalogMedia, added_at: DateTime<Utc>) -> Self {
        Self {
            id: media.id,
            title: ListTitle {
                romaji: media.title.romaji.clone(),
                english: media.title.english.clone().filter(|t| !t.is_empty()),
            },
            cover_image: media.cover_image.large.clone().unwrap_or_default(),
            status: media.status.unwrap_or(MediaStatus::Unknown),
            episodes: media.episodes,
            season: media.season,
            season_year: media.season_year,
            duration: media.duration,
            start_date: media.start_date,
            end_date: media.end_date,
            studio: media.main_studio().map(str::to_string),
            description: media.description.clone().unwrap_or_default(),
            added_at,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.english.as_deref().unwrap_or(&self.title.romaji)
    }
}
