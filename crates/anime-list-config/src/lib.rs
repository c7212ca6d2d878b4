pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{AniListConfig, Config, FirebaseConfig, GalleryConfig, LoggingConfig, MalConfig, SyncConfig};
pub use credentials::{CredentialStore, StoredSession};
pub use paths::{PathManager, container_base_path};
