use anime_list_models::UserId;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const KEY_USER_ID: &str = "firebase_user_id";
const KEY_EMAIL: &str = "firebase_email";
const KEY_ID_TOKEN: &str = "firebase_id_token";
const KEY_REFRESH_TOKEN: &str = "firebase_refresh_token";
const KEY_TOKEN_EXPIRES: &str = "firebase_token_expires";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// A signed-in identity persisted between runs
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub user_id: UserId,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// True when the id token expires within `margin` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at - margin <= now
    }
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn get_all_keys(&self) -> Vec<String> {
        self.credentials.keys().cloned().collect()
    }

    /// The persisted session, if every required key is present and parses
    pub fn session(&self) -> Option<StoredSession> {
        let user_id = self.get(KEY_USER_ID)?;
        let id_token = self.get(KEY_ID_TOKEN)?;
        let refresh_token = self.get(KEY_REFRESH_TOKEN)?;
        let expires_at = self
            .get(KEY_TOKEN_EXPIRES)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))?;

        Some(StoredSession {
            user_id: UserId::new(user_id.clone()),
            email: self.get(KEY_EMAIL).cloned(),
            id_token: id_token.clone(),
            refresh_token: refresh_token.clone(),
            expires_at,
        })
    }

    pub fn set_session(&mut self, session: &StoredSession) {
        self.set(KEY_USER_ID.to_string(), session.user_id.to_string());
        match &session.email {
            Some(email) => self.set(KEY_EMAIL.to_string(), email.clone()),
            None => self.remove(KEY_EMAIL),
        }
        self.set(KEY_ID_TOKEN.to_string(), session.id_token.clone());
        self.set(KEY_REFRESH_TOKEN.to_string(), session.refresh_token.clone());
        self.set(KEY_TOKEN_EXPIRES.to_string(), session.expires_at.to_rfc3339());
    }

    pub fn clear_session(&mut self) {
        for key in [KEY_USER_ID, KEY_EMAIL, KEY_ID_TOKEN, KEY_REFRESH_TOKEN, KEY_TOKEN_EXPIRES] {
            self.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_session() -> StoredSession {
        StoredSession {
            user_id: UserId::new("uid-42"),
            email: Some("fan@example.com".to_string()),
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_session(&sample_session());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        let session = loaded_store.session().unwrap();
        assert_eq!(session.user_id.as_str(), "uid-42");
        assert_eq!(session.email.as_deref(), Some("fan@example.com"));
        assert_eq!(session.refresh_token, "refresh-token");
        // Allow 1 second difference for serialization
        assert!((session.expires_at - sample_session().expires_at).num_seconds().abs() < 2);
    }

    #[test]
    fn test_incomplete_session_is_ignored() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set(KEY_USER_ID.to_string(), "uid-42".to_string());
        assert!(store.session().is_none());
    }

    #[test]
    fn test_clear_session_keeps_other_keys() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set_session(&sample_session());
        store.set("other".to_string(), "value".to_string());

        store.clear_session();
        assert!(store.session().is_none());
        assert_eq!(store.get_all_keys(), vec!["other".to_string()]);
    }

    #[test]
    fn test_session_expiry_margin() {
        let now = Utc::now();
        let mut session = sample_session();
        session.expires_at = now + chrono::Duration::minutes(3);
        assert!(!session.is_expired(now));
        assert!(session.expires_within(now, chrono::Duration::minutes(5)));
        assert!(!session.expires_within(now, chrono::Duration::minutes(1)));
    }
}
