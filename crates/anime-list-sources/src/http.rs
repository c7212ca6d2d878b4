use crate::error::{SourceError, SourceResult};
use reqwest::{Client, Response};
use std::time::Duration;

const USER_AGENT: &str = concat!("animevault/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with the configured request timeout
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Pass successful responses through; turn everything else into a classified error
pub async fn ensure_success(response: Response) -> SourceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::from_status(status.as_u16(), extract_message(&body)))
}

/// Google-style error bodies carry `{"error": {"message": ...}}`; fall back to the raw text
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
