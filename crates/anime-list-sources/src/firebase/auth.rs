use crate::error::{SourceError, SourceResult};
use crate::http::ensure_success;
use crate::traits::IdentityProvider;
use anime_list_config::{CredentialStore, StoredSession};
use anime_list_models::UserId;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const REFRESH_MARGIN_MINUTES: i64 = 5;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    user_id: String,
}

fn expiry(now: DateTime<Utc>, expires_in: Option<&str>) -> DateTime<Utc> {
    let secs = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    now + Duration::seconds(secs)
}

/// Email/password identity over the Firebase Auth REST API.
///
/// The session is persisted in the credential store so a later run starts
/// signed in. Id tokens are refreshed when they are within five minutes of
/// expiry.
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
    credentials_file: Option<PathBuf>,
    session: Mutex<Option<StoredSession>>,
    user: watch::Sender<Option<UserId>>,
}

impl FirebaseAuth {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            client,
            api_key: api_key.into(),
            credentials_file: None,
            session: Mutex::new(None),
            user,
        }
    }

    /// Persist sessions to (and restore them from) this credentials file
    pub fn with_credentials_file(mut self, path: PathBuf) -> Self {
        self.credentials_file = Some(path);
        self
    }

    /// Resume the session saved by an earlier run, if any
    pub async fn restore(&self) -> SourceResult<Option<UserId>> {
        let Some(path) = &self.credentials_file else {
            return Ok(None);
        };
        let mut store = CredentialStore::new(path.clone());
        store
            .load()
            .map_err(|e| SourceError::Config(format!("failed to read credentials: {}", e)))?;

        let restored = store.session();
        let user_id = restored.as_ref().map(|s| s.user_id.clone());
        if let Some(user_id) = &user_id {
            debug!(user_id = %user_id, "restored saved session");
        }
        *self.session.lock().await = restored;
        self.publish(user_id.clone());
        Ok(user_id)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> SourceResult<UserId> {
        let user_id = self.password_flow("accounts:signUp", email, password).await?;
        info!(user_id = %user_id, "created account");
        Ok(user_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SourceResult<UserId> {
        let user_id = self
            .password_flow("accounts:signInWithPassword", email, password)
            .await?;
        info!(user_id = %user_id, "signed in");
        Ok(user_id)
    }

    pub async fn sign_out(&self) -> SourceResult<()> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            info!(user_id = %previous.user_id, "signed out");
        }
        self.persist(None)?;
        self.publish(None);
        Ok(())
    }

    pub async fn email(&self) -> Option<String> {
        self.session.lock().await.as_ref().and_then(|s| s.email.clone())
    }

    /// A valid id token for the signed-in user, refreshed if close to expiry
    pub async fn id_token(&self) -> SourceResult<String> {
        let mut session = self.session.lock().await;
        let current = session.as_ref().ok_or(SourceError::NotAuthenticated)?;
        let margin = Duration::minutes(REFRESH_MARGIN_MINUTES);
        if !current.expires_within(Utc::now(), margin) {
            return Ok(current.id_token.clone());
        }

        debug!(user_id = %current.user_id, expires_at = %current.expires_at, "refreshing id token");
        let refreshed = self.refresh(current).await?;
        let token = refreshed.id_token.clone();
        self.persist(Some(&refreshed))?;
        self.publish(Some(refreshed.user_id.clone()));
        *session = Some(refreshed);
        Ok(token)
    }

    async fn password_flow(&self, endpoint: &str, email: &str, password: &str) -> SourceResult<UserId> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SourceError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/{}", IDENTITY_URL, endpoint))
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;
        let body: PasswordResponse = ensure_success(response).await?.json().await?;
        let session = session_from_password(body, Utc::now());
        let user_id = session.user_id.clone();

        let mut guard = self.session.lock().await;
        self.persist(Some(&session))?;
        *guard = Some(session);
        self.publish(Some(user_id.clone()));
        Ok(user_id)
    }

    async fn refresh(&self, current: &StoredSession) -> SourceResult<StoredSession> {
        let response = self
            .client
            .post(TOKEN_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": current.refresh_token,
            }))
            .send()
            .await?;
        let body: RefreshResponse = ensure_success(response).await?.json().await?;

        Ok(StoredSession {
            user_id: UserId::new(body.user_id),
            email: current.email.clone(),
            expires_at: expiry(Utc::now(), body.expires_in.as_deref()),
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }

    fn persist(&self, session: Option<&StoredSession>) -> SourceResult<()> {
        match &self.credentials_file {
            Some(path) => write_session(path.clone(), session)
                .map_err(|e| SourceError::Config(format!("failed to save credentials: {}", e))),
            None => Ok(()),
        }
    }

    /// Announce the current user. Sign-in, restore and token refresh all
    /// notify watchers, even when the user is unchanged.
    fn publish(&self, user_id: Option<UserId>) {
        self.user.send_replace(user_id);
    }
}

fn write_session(path: PathBuf, session: Option<&StoredSession>) -> anyhow::Result<()> {
    let mut store = CredentialStore::new(path);
    store.load()?;
    match session {
        Some(session) => store.set_session(session),
        None => store.clear_session(),
    }
    store.save()
}

fn session_from_password(body: PasswordResponse, now: DateTime<Utc>) -> StoredSession {
    StoredSession {
        user_id: UserId::new(body.local_id),
        email: body.email,
        expires_at: expiry(now, body.expires_in.as_deref()),
        id_token: body.id_token,
        refresh_token: body.refresh_token,
    }
}

impl IdentityProvider for FirebaseAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.borrow().clone()
    }

    fn watch_user(&self) -> watch::Receiver<Option<UserId>> {
        self.user.subscribe()
    }
}
