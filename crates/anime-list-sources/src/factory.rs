//! Builds the vendor adapters from configuration.

use crate::anilist::AniListClient;
use crate::error::{SourceError, SourceResult};
use crate::firebase::{FirebaseAuth, FirebaseStorage, FirestoreClient};
use crate::http::build_client;
use crate::mal::MalClient;
use crate::traits::{DocumentStore, IdentityProvider, ObjectStore};
use anime_list_config::{Config, PathManager};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The hosted backend: one identity provider shared by the document and object stores
#[derive(Clone)]
pub struct FirebaseServices {
    pub auth: Arc<FirebaseAuth>,
    pub firestore: Arc<FirestoreClient>,
    pub storage: Arc<FirebaseStorage>,
}

impl FirebaseServices {
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.auth.clone()
    }

    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        self.firestore.clone()
    }

    pub fn objects(&self) -> Arc<dyn ObjectStore> {
        self.storage.clone()
    }
}

pub struct ServiceFactory {
    config: Config,
    paths: PathManager,
    client: Client,
}

impl ServiceFactory {
    pub fn new(config: Config, paths: PathManager) -> Self {
        let client = build_client(Duration::from_secs(config.sync.request_timeout_secs));
        Self { config, paths, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &PathManager {
        &self.paths
    }

    pub fn anilist(&self) -> AniListClient {
        AniListClient::new(self.client.clone(), self.config.anilist.endpoint.clone())
    }

    pub fn mal(&self) -> SourceResult<MalClient> {
        MalClient::from_config(&self.config)
    }

    /// Connect the hosted backend and resume any saved session
    pub async fn firebase(&self) -> SourceResult<FirebaseServices> {
        let firebase = self
            .config
            .firebase
            .as_ref()
            .filter(|_| self.config.is_firebase_configured())
            .ok_or_else(|| {
                SourceError::Config("firebase is not configured (run `animevault config init`)".to_string())
            })?;

        let auth = Arc::new(
            FirebaseAuth::new(self.client.clone(), firebase.api_key.clone())
                .with_credentials_file(self.paths.credentials_file()),
        );
        if let Some(user_id) = auth.restore().await? {
            debug!(user_id = %user_id, "resumed saved session");
        }

        let firestore = Arc::new(FirestoreClient::new(
            self.client.clone(),
            auth.clone(),
            &firebase.project_id,
            &firebase.database_id,
            Duration::from_secs(self.config.sync.poll_interval_secs.max(1)),
        ));
        let storage = Arc::new(FirebaseStorage::new(
            self.client.clone(),
            auth.clone(),
            firebase.storage_bucket.clone(),
        ));

        Ok(FirebaseServices {
            auth,
            firestore,
            storage,
        })
    }
}
