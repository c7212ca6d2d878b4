use crate::anilist::queries;
use crate::error::{SourceError, SourceResult};
use crate::http::build_client;
use anime_list_config::Config;
use anime_list_models::{CatalogMedia, MediaSummary};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Search terms shorter than this never reach the API
pub const MIN_SEARCH_CHARS: usize = 2;
const SEARCH_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "Page")]
    page: SearchPage,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    media: Vec<MediaSummary>,
}

#[derive(Debug, Deserialize)]
struct DetailsData {
    #[serde(rename = "Media")]
    media: Option<CatalogMedia>,
}

/// Client for the AniList GraphQL API
#[derive(Clone)]
pub struct AniListClient {
    client: Client,
    endpoint: String,
}

impl AniListClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            build_client(Duration::from_secs(config.sync.request_timeout_secs)),
            config.anilist.endpoint.clone(),
        )
    }

    /// Up to ten anime matching `term`; short terms return nothing without a request
    pub async fn search(&self, term: &str) -> SourceResult<Vec<MediaSummary>> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }
        debug!(term, "searching AniList");
        let data: SearchData = self
            .query(
                queries::SEARCH_ANIME,
                json!({ "search": term, "perPage": SEARCH_PAGE_SIZE }),
            )
            .await?;
        Ok(data.page.media)
    }

    /// Full record for one anime
    pub async fn media(&self, id: i64) -> SourceResult<CatalogMedia> {
        debug!(anime_id = id, "fetching AniList details");
        let data: DetailsData = self
            .query(queries::ANIME_DETAILS, json!({ "id": id }))
            .await?;
        data.media
            .ok_or_else(|| SourceError::NotFound(format!("anime {}", id)))
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> SourceResult<T> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        // GraphQL errors arrive with non-2xx statuses too, so read the body either way
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(status, &body)
    }
}

fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> SourceResult<T> {
    let parsed: GraphQlResponse<T> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if !(200..300).contains(&status) => {
            return Err(SourceError::from_status(status, body.trim().to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(error) = parsed.errors.first() {
        let error_status = error.status.unwrap_or(status);
        return Err(SourceError::from_status(error_status, error.message.clone()));
    }

    parsed
        .data
        .ok_or_else(|| SourceError::Decode("response has neither data nor errors".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_short_terms_skip_the_request() {
        // Unroutable endpoint: any request would fail
        let client = AniListClient::new(Client::new(), "http://127.0.0.1:9/graphql");
        assert!(client.search("").await.unwrap().is_empty());
        assert!(client.search(" a ").await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_search_page() {
        let body = r#"{"data": {"Page": {"media": [
            {"id": 1, "title": {"romaji": "Cowboy Bebop", "english": "Cowboy Bebop"},
             "coverImage": {"medium": "m.jpg"}, "format": "TV", "episodes": 26,
             "averageScore": 86, "seasonYear": 1998, "status": "FINISHED"}
        ]}}}"#;
        let data: SearchData = parse_response(200, body).unwrap();
        assert_eq!(data.page.media.len(), 1);
        assert_eq!(data.page.media[0].title.romaji, "Cowboy Bebop");
    }

    #[test]
    fn test_missing_media_is_not_found() {
        let body = r#"{"errors": [{"message": "Not Found.", "status": 404}], "data": {"Media": null}}"#;
        let err = parse_response::<DetailsData>(404, body).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_null_media_without_errors() {
        let data: DetailsData = parse_response(200, r#"{"data": {"Media": null}}"#).unwrap();
        assert!(data.media.is_none());
    }

    #[test]
    fn test_rate_limit_is_unavailable() {
        let err = parse_response::<SearchData>(429, "Too Many Requests").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
