use crate::media::{FuzzyDate, MediaStatus, Season};
use crate::timestamp::null_as_default;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaTitle {
    #[serde(default, deserialize_with = "null_as_default")]
    pub romaji: String,
    pub english: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
}

impl MediaTitle {
    /// English title when there is one, romaji otherwise
    pub fn preferred(&self) -> &str {
        self.english
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.romaji)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub extra_large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default)]
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Studio {
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterConnection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<CharacterEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterEdge {
    pub node: Character,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Character {
    pub id: i64,
    #[serde(default)]
    pub name: CharacterName,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: CoverImage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterName {
    pub full: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub media_recommendation: Option<RecommendedMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedMedia {
    pub id: i64,
    #[serde(default)]
    pub title: MediaTitle,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    pub season_year: Option<i32>,
    pub format: Option<String>,
    pub average_score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaTag {
    pub id: i64,
    pub name: String,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalLink {
    pub id: i64,
    pub url: Option<String>,
    pub site: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trailer {
    pub id: Option<String>,
    pub site: Option<String>,
    pub thumbnail: Option<String>,
}

impl Trailer {
    pub fn url(&self) -> Option<String> {
        let id = self.id.as_deref()?;
        match self.site.as_deref() {
            Some("youtube") => Some(format!("https://www.youtube.com/watch?v={}", id)),
            Some("dailymotion") => Some(format!("https://www.dailymotion.com/video/{}", id)),
            _ => None,
        }
    }
}

/// Full AniList media record, as returned by the details query.
///
/// This is the caller-supplied record `ListStore::add_item` snapshots from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMedia {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: MediaTitle,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    #[serde(default)]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub season: Option<Season>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub average_score: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub studios: Connection<Studio>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: CharacterConnection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Connection<Recommendation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<MediaTag>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub start_date: Option<FuzzyDate>,
    #[serde(default)]
    pub end_date: Option<FuzzyDate>,
}

impl CatalogMedia {
    pub fn main_studio(&self) -> Option<&str> {
        self.studios.nodes.first().map(|s| s.name.as_str())
    }

    /// Tags ordered by rank, highest first
    pub fn top_tags(&self, limit: usize) -> Vec<&MediaTag> {
        let mut tags: Vec<&MediaTag> = self.tags.iter().collect();
        tags.sort_by(|a, b| b.rank.unwrap_or(0).cmp(&a.rank.unwrap_or(0)));
        tags.truncate(limit);
        tags
    }

    pub fn recommended(&self) -> impl Iterator<Item = &RecommendedMedia> {
        self.recommendations
            .nodes
            .iter()
            .filter_map(|r| r.media_recommendation.as_ref())
    }
}

/// Search hit from the AniList `Page.media` query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSummary {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: MediaTitle,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    pub format: Option<String>,
    pub episodes: Option<u32>,
    pub average_score: Option<u32>,
    pub season_year: Option<i32>,
    pub status: Option<MediaStatus>,
}
