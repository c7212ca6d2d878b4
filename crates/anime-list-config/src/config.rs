use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";
const PLACEHOLDER_PROJECT_ID: &str = "YOUR_PROJECT_ID";
const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anilist: AniListConfig,
    #[serde(default)]
    pub mal: Option<MalConfig>,
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AniListConfig {
    #[serde(default = "default_anilist_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalConfig {
    pub client_id: String,
    #[serde(default = "default_mal_base_url")]
    pub base_url: String,
}

/// Hosted backend: identity, document store and object store all live in one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub storage_bucket: String,
    #[serde(default = "default_database_id")]
    pub database_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often the live subscription re-reads the list document
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to this file (rotated daily) instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_anilist_endpoint() -> String {
    "https://graphql.anilist.co".to_string()
}

fn default_mal_base_url() -> String {
    "https://api.myanimelist.net/v2".to_string()
}

fn default_database_id() -> String {
    "(default)".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_file_size_bytes() -> u64 {
    5 * 1024 * 1024 // 5 MiB
}

impl Default for AniListConfig {
    fn default() -> Self {
        Self { endpoint: default_anilist_endpoint() }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self { max_file_size_bytes: default_max_file_size_bytes() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anilist: AniListConfig::default(),
            mal: None,
            firebase: None,
            sync: SyncConfig::default(),
            gallery: GalleryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Starter file written by `config init`, with placeholders to fill in
    pub fn template() -> Self {
        Self {
            mal: Some(MalConfig {
                client_id: PLACEHOLDER_CLIENT_ID.to_string(),
                base_url: default_mal_base_url(),
            }),
            firebase: Some(FirebaseConfig {
                api_key: PLACEHOLDER_API_KEY.to_string(),
                project_id: PLACEHOLDER_PROJECT_ID.to_string(),
                storage_bucket: format!("{}.appspot.com", PLACEHOLDER_PROJECT_ID),
                database_id: default_database_id(),
            }),
            ..Self::default()
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file when it exists, defaults otherwise; environment overrides apply in both cases
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `MAL_CLIENT_ID` wins over the file, mirroring how the hosted deployment is configured
    pub fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = std::env::var("MAL_CLIENT_ID") {
            if !client_id.is_empty() {
                match self.mal.as_mut() {
                    Some(mal) => mal.client_id = client_id,
                    None => {
                        self.mal = Some(MalConfig {
                            client_id,
                            base_url: default_mal_base_url(),
                        })
                    }
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.anilist.endpoint.is_empty() {
            return Err(anyhow::anyhow!("anilist.endpoint cannot be empty"));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("sync.poll_interval_secs must be at least 1"));
        }

        if self.gallery.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("gallery.max_file_size_bytes must be positive"));
        }

        if let Some(firebase) = &self.firebase {
            if firebase.api_key.is_empty() || firebase.api_key == PLACEHOLDER_API_KEY {
                return Err(anyhow::anyhow!("firebase.api_key is not configured"));
            }
            if firebase.project_id.is_empty() || firebase.project_id == PLACEHOLDER_PROJECT_ID {
                return Err(anyhow::anyhow!("firebase.project_id is not configured"));
            }
            if firebase.storage_bucket.is_empty() {
                return Err(anyhow::anyhow!("firebase.storage_bucket is not configured"));
            }
        }

        Ok(())
    }

    pub fn mal_client_id(&self) -> Option<&str> {
        self.mal
            .as_ref()
            .map(|mal| mal.client_id.as_str())
            .filter(|id| !id.is_empty() && *id != PLACEHOLDER_CLIENT_ID)
    }

    pub fn is_firebase_configured(&self) -> bool {
        self.firebase.as_ref().map_or(false, |firebase| {
            !firebase.api_key.is_empty()
                && firebase.api_key != PLACEHOLDER_API_KEY
                && !firebase.project_id.is_empty()
                && firebase.project_id != PLACEHOLDER_PROJECT_ID
        })
    }

    /// Get list of configured services
    pub fn configured_services(&self) -> Vec<String> {
        let mut services = vec!["anilist".to_string()];

        if self.mal_client_id().is_some() {
            services.push("mal".to_string());
        }

        if self.is_firebase_configured() {
            services.push("firebase".to_string());
        }

        services
    }
}
