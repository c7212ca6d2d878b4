use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MalPicture {
    pub medium: Option<String>,
    pub large: Option<String>,
}

impl MalPicture {
    /// Largest available rendition
    pub fn best(&self) -> Option<&str> {
        self.large.as_deref().or(self.medium.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlternativeTitles {
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub en: Option<String>,
    pub ja: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartSeason {
    pub year: i32,
    pub season: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Broadcast {
    pub day_of_the_week: Option<String>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedAnime {
    pub node: MalAnimeRef,
    pub relation_type_formatted: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MalRecommendation {
    pub node: MalAnimeRef,
    #[serde(default)]
    pub num_recommendations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MalAnimeRef {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub main_picture: Option<MalPicture>,
}

/// MyAnimeList anime record. Seasonal listings only carry `id`, `title` and
/// `main_picture`; the details route fills in the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MalAnime {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub main_picture: Option<MalPicture>,
    #[serde(default)]
    pub alternative_titles: Option<AlternativeTitles>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub num_list_users: Option<u32>,
    #[serde(default)]
    pub num_scoring_users: Option<u32>,
    #[serde(default)]
    pub nsfw: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub genres: Vec<NamedEntry>,
    #[serde(default)]
    pub num_episodes: Option<u32>,
    #[serde(default)]
    pub start_season: Option<StartSeason>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,
    #[serde(default)]
    pub source: Option<String>,
    /// Seconds
    #[serde(default)]
    pub average_episode_duration: Option<u32>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub studios: Vec<NamedEntry>,
    #[serde(default)]
    pub related_anime: Vec<RelatedAnime>,
    #[serde(default)]
    pub recommendations: Vec<MalRecommendation>,
}

impl MalAnime {
    pub fn picture_url(&self) -> Option<&str> {
        self.main_picture.as_ref().and_then(MalPicture::best)
    }

    pub fn english_title(&self) -> Option<&str> {
        self.alternative_titles
            .as_ref()
            .and_then(|alt| alt.en.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonalEntry {
    pub node: MalAnime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonalPage {
    #[serde(default)]
    pub data: Vec<SeasonalEntry>,
}

impl SeasonalPage {
    pub fn into_anime(self) -> Vec<MalAnime> {
        self.data.into_iter().map(|entry| entry.node).collect()
    }
}
