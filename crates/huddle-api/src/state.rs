use std::sync::Arc;

use anyhow::anyhow;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tracing::error;

use huddle_crypto::CredentialStore;
use huddle_db::Database;
use huddle_gateway::Dispatcher;

use crate::config::Config;
use crate::error::AppError;
use crate::provisioner::Provisioner;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub credentials: CredentialStore,
    pub dispatcher: Dispatcher,
    pub provisioner: Provisioner,
    pub config: Config,
    /// Signs the session cookie. Derived from the configured session secret.
    pub cookie_key: Key,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, credentials: CredentialStore, config: Config) -> anyhow::Result<Self> {
        let provisioner = Provisioner::from_config(&config)?;
        let cookie_key = Key::from(Sha512::digest(config.session_secret.as_bytes()).as_slice());

        Ok(Self {
            db,
            credentials,
            dispatcher: Dispatcher::new(),
            provisioner,
            config,
            cookie_key,
        })
    }

    /// Run a blocking repository call off the async runtime.
    pub async fn run_db<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                AppError::Internal(anyhow!("blocking task failed: {}", e))
            })?
            .map_err(AppError::Internal)
    }

    pub async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AppError::Internal(anyhow!("blocking task failed: {}", e)))?
            .map_err(AppError::Internal)
    }

    pub async fn verify_password(&self, supplied: String, stored: String) -> Result<bool, AppError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.verify(&supplied, &stored))
            .await
            .map_err(|e| AppError::Internal(anyhow!("blocking task failed: {}", e)))
    }
}
