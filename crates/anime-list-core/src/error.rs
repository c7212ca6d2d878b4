use anime_list_sources::SourceError;

/// Failures of the synchronized list store
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// No signed-in user; nothing was sent to the backend
    #[error("Not signed in")]
    NotAuthenticated,
    /// A point read, write or subscription attach failed; the local mirror is unchanged
    #[error("List backend unavailable: {0}")]
    RemoteUnavailable(#[source] SourceError),
    /// The live channel failed after it was attached
    #[error("Live list updates failed: {0}")]
    Subscription(String),
    #[error("Stored list is malformed: {0}")]
    Decode(String),
}

impl ListError {
    pub(crate) fn remote(err: SourceError) -> Self {
        match err {
            SourceError::NotAuthenticated => ListError::NotAuthenticated,
            other => ListError::RemoteUnavailable(other),
        }
    }
}

impl From<serde_json::Error> for ListError {
    fn from(err: serde_json::Error) -> Self {
        ListError::Decode(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Only image files are allowed (got {0})")]
    NotAnImage(String),
    #[error("File is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("Gallery backend error: {0}")]
    Remote(#[from] SourceError),
    #[error("Stored image record is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}
