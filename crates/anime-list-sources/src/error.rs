/// Failure of a remote adapter (catalog API, document store, identity provider, object store)
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => SourceError::NotAuthenticated,
            404 => SourceError::NotFound(message),
            429 | 500..=599 => SourceError::Unavailable(format!("{} - {}", status, message)),
            _ => SourceError::Remote { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}
