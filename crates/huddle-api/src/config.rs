use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Session secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "your_session_secret_here",
    "dev-secret-change-me",
];

/// Secret used in development when none is configured.
const DEV_SESSION_SECRET: &str = "huddle-development-session-secret";

const DEFAULT_ZOOM_API_BASE: &str = "https://api.zoom.us/v2";
const DEFAULT_ZOOM_OAUTH_BASE: &str = "https://zoom.us";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl FromStr for DeploymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("Unknown HUDDLE_ENV '{}'", other),
        }
    }
}

/// Server-to-server OAuth credentials for the meeting provider.
#[derive(Debug, Clone)]
pub struct ZoomConfig {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub oauth_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub mode: DeploymentMode,
    pub session_secret: String,
    pub zoom: Option<ZoomConfig>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("HUDDLE_ENV") {
            Some(v) => v.parse()?,
            None => DeploymentMode::Development,
        };

        let port = match get("HUDDLE_PORT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HUDDLE_PORT '{}' is not a port number", v))?,
            None => 5000,
        };

        let session_secret = match (get("HUDDLE_SESSION_SECRET"), mode) {
            (Some(secret), DeploymentMode::Production)
                if PLACEHOLDER_SECRETS.contains(&secret.as_str()) =>
            {
                bail!("HUDDLE_SESSION_SECRET is still a placeholder value")
            }
            (Some(secret), _) => secret,
            (None, DeploymentMode::Production) => bail!("HUDDLE_SESSION_SECRET is required in production"),
            (None, DeploymentMode::Development) => {
                warn!("HUDDLE_SESSION_SECRET not set, using the development secret");
                DEV_SESSION_SECRET.to_string()
            }
        };

        let zoom = match (
            get("ZOOM_ACCOUNT_ID"),
            get("ZOOM_CLIENT_ID"),
            get("ZOOM_CLIENT_SECRET"),
        ) {
            (Some(account_id), Some(client_id), Some(client_secret)) => Some(ZoomConfig {
                account_id,
                client_id,
                client_secret,
                api_base: get("ZOOM_API_BASE").unwrap_or_else(|| DEFAULT_ZOOM_API_BASE.into()),
                oauth_base: get("ZOOM_OAUTH_BASE").unwrap_or_else(|| DEFAULT_ZOOM_OAUTH_BASE.into()),
            }),
            _ => None,
        };

        if mode == DeploymentMode::Production && zoom.is_none() {
            bail!("ZOOM_ACCOUNT_ID, ZOOM_CLIENT_ID and ZOOM_CLIENT_SECRET are required in production");
        }

        Ok(Self {
            host: get("HUDDLE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("HUDDLE_DB_PATH").unwrap_or_else(|| "huddle.db".into()).into(),
            upload_dir: get("HUDDLE_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            mode,
            session_secret,
            zoom,
        })
    }

    /// Development defaults, with uploads written under `upload_dir`.
    pub fn development(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            db_path: ":memory:".into(),
            upload_dir: upload_dir.into(),
            mode: DeploymentMode::Development,
            session_secret: DEV_SESSION_SECRET.into(),
            zoom: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode == DeploymentMode::Production
    }
}
