//! Meeting provisioning: one always-on meeting room per company.

use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use huddle_types::api::MeetingDetails;

use crate::config::{Config, DeploymentMode, ZoomConfig};

const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn meeting_topic(company_name: &str) -> String {
    format!("{} - 24/7 Company Meeting", company_name)
}

/// The meeting backend, chosen once at startup.
pub enum Provisioner {
    /// Local fake: no network, synthetic ids.
    Mock,
    Zoom(ZoomClient),
}

impl Provisioner {
    pub fn from_config(config: &Config) -> Result<Self> {
        match (config.mode, &config.zoom) {
            (DeploymentMode::Production, Some(zoom)) => {
                info!("Meeting provisioner: Zoom ({})", zoom.api_base);
                Ok(Self::Zoom(ZoomClient::new(zoom.clone())?))
            }
            (DeploymentMode::Production, None) => bail!("Zoom credentials are required in production"),
            (DeploymentMode::Development, _) => {
                info!("Meeting provisioner: mock");
                Ok(Self::Mock)
            }
        }
    }

    pub async fn create_meeting(&self, topic: &str) -> Result<MeetingDetails> {
        match self {
            Self::Mock => Ok(mock_meeting(topic)),
            Self::Zoom(client) => client.create_meeting(topic).await,
        }
    }

    pub async fn get_meeting_info(&self, meeting_id: &str) -> Result<Value> {
        match self {
            Self::Mock => Ok(json!({
                "id": meeting_id,
                "type": 8,
                "status": "waiting",
                "join_url": format!("https://zoom.us/j/{}", meeting_id),
                "settings": {
                    "host_video": true,
                    "participant_video": true,
                    "join_before_host": true,
                    "waiting_room": false,
                },
            })),
            Self::Zoom(client) => client.get_meeting_info(meeting_id).await,
        }
    }

    /// Returns whether the provider confirmed the deletion.
    pub async fn delete_meeting(&self, meeting_id: &str) -> bool {
        match self {
            Self::Mock => true,
            Self::Zoom(client) => match client.delete_meeting(meeting_id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    warn!("Failed to delete meeting {}: {:#}", meeting_id, e);
                    false
                }
            },
        }
    }
}

fn mock_meeting(topic: &str) -> MeetingDetails {
    let mut rng = rand::rng();
    let id = rng.random_range(100_000_000u32..1_000_000_000).to_string();
    let password: String = (0..6)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect();

    debug!("Mock meeting {} created for '{}'", id, topic);
    MeetingDetails {
        join_url: format!("https://zoom.us/j/{}", id),
        id,
        password,
        topic: topic.to_string(),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CreatedMeeting {
    id: u64,
    join_url: String,
    #[serde(default)]
    password: String,
    topic: String,
}

/// Thin client for the Zoom REST API using server-to-server OAuth.
pub struct ZoomClient {
    http: reqwest::Client,
    config: ZoomConfig,
}

impl ZoomClient {
    pub fn new(config: ZoomConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    async fn access_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/oauth/token", self.config.oauth_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.config.account_id.as_str()),
            ])
            .send()
            .await
            .context("Zoom token request failed")?;

        if !resp.status().is_success() {
            bail!("Zoom token request returned {}", resp.status());
        }

        let token: TokenResponse = resp.json().await.context("Malformed Zoom token response")?;
        Ok(token.access_token)
    }

    async fn create_meeting(&self, topic: &str) -> Result<MeetingDetails> {
        let token = self.access_token().await?;
        let body = json!({
            "topic": topic,
            "type": 8,
            "recurrence": { "type": 1, "repeat_interval": 1 },
            "settings": {
                "host_video": true,
                "participant_video": true,
                "join_before_host": true,
                "mute_upon_entry": false,
                "waiting_room": false,
                "audio": "both",
                "auto_recording": "none",
            },
        });

        let resp = self
            .http
            .post(format!("{}/users/me/meetings", self.config.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Zoom create meeting request failed")?;

        if !resp.status().is_success() {
            bail!("Zoom create meeting returned {}", resp.status());
        }

        let meeting: CreatedMeeting = resp.json().await.context("Malformed Zoom meeting")?;
        info!("Zoom meeting {} created", meeting.id);
        Ok(MeetingDetails {
            id: meeting.id.to_string(),
            join_url: meeting.join_url,
            password: meeting.password,
            topic: meeting.topic,
        })
    }

    async fn get_meeting_info(&self, meeting_id: &str) -> Result<Value> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/meetings/{}", self.config.api_base, meeting_id))
            .bearer_auth(token)
            .send()
            .await
            .context("Zoom meeting info request failed")?;

        if !resp.status().is_success() {
            bail!("Zoom meeting info returned {}", resp.status());
        }

        Ok(resp.json().await?)
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<bool> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .delete(format!("{}/meetings/{}", self.config.api_base, meeting_id))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}
