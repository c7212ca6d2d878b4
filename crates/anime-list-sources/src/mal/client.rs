use crate::error::{SourceError, SourceResult};
use crate::http::{build_client, ensure_success};
use crate::mal::types::{MalAnime, SeasonalPage};
use anime_list_config::Config;
use anime_list_models::Season;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const CLIENT_ID_HEADER: &str = "X-MAL-CLIENT-ID";
const SEASONAL_LIMIT: u32 = 100;
/// How many seasonal entries the trending view shows
pub const DEFAULT_TRENDING: usize = 4;

const DETAIL_FIELDS: &str = "id,title,main_picture,alternative_titles,start_date,end_date,synopsis,mean,rank,popularity,num_list_users,num_scoring_users,nsfw,created_at,updated_at,media_type,status,genres,my_list_status,num_episodes,start_season,broadcast,source,average_episode_duration,rating,pictures,background,related_anime,related_manga,recommendations,studios,statistics";

/// Client for the MyAnimeList v2 REST API (client-id authentication)
#[derive(Clone)]
pub struct MalClient {
    client: Client,
    base_url: String,
    client_id: String,
}

impl MalClient {
    pub fn new(client: Client, base_url: impl Into<String>, client_id: impl Into<String>) -> SourceResult<Self> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(SourceError::Config("MAL client id is empty".to_string()));
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id,
        })
    }

    /// Fails before any request when no client id is configured
    pub fn from_config(config: &Config) -> SourceResult<Self> {
        let client_id = config.mal_client_id().ok_or_else(|| {
            SourceError::Config("MAL client id is not set (config [mal] client_id or MAL_CLIENT_ID)".to_string())
        })?;
        let base_url = config
            .mal
            .as_ref()
            .map(|mal| mal.base_url.clone())
            .unwrap_or_default();
        Self::new(
            build_client(Duration::from_secs(config.sync.request_timeout_secs)),
            base_url,
            client_id,
        )
    }

    /// Anime airing in `season` of `year`
    pub async fn seasonal(&self, year: i32, season: Season, limit: u32) -> SourceResult<Vec<MalAnime>> {
        let url = format!("{}/anime/season/{}/{}", self.base_url, year, season.as_mal_str());
        debug!(year, season = %season, limit, "fetching MAL seasonal list");
        let response = self
            .client
            .get(url)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let page: SeasonalPage = ensure_success(response).await?.json().await?;
        Ok(page.into_anime())
    }

    /// First `count` entries of the season that `now` falls in
    pub async fn top_seasonal(&self, now: DateTime<Utc>, count: usize) -> SourceResult<Vec<MalAnime>> {
        let (year, season) = Season::for_date(now);
        let mut anime = self.seasonal(year, season, SEASONAL_LIMIT).await?;
        anime.truncate(count);
        Ok(anime)
    }

    pub async fn anime(&self, id: i64) -> SourceResult<MalAnime> {
        debug!(anime_id = id, "fetching MAL details");
        let response = self
            .client
            .get(format!("{}/anime/{}", self.base_url, id))
            .header(CLIENT_ID_HEADER, &self.client_id)
            .query(&[("fields", DETAIL_FIELDS)])
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}
