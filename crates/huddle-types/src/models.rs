use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization scope of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    CompanyAdmin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::CompanyAdmin => "company_admin",
            Role::Employee => "employee",
        }
    }

    /// Tenant roles must carry a company affiliation.
    pub fn requires_company(&self) -> bool {
        matches!(self, Role::CompanyAdmin | Role::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "company_admin" => Ok(Role::CompanyAdmin),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Voice,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Voice => "voice",
        }
    }
}

impl FromStr for MessageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "voice" => Ok(MessageType::Voice),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Best-effort classification of a login's user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
    pub user_agent: String,
}

/// A user as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub company_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_blocked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_ip_address: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
}

/// Provisioned meeting for a company. Stored as a unit, never partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingTriple {
    pub meeting_id: String,
    pub join_url: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub zoom_meeting_id: Option<String>,
    pub zoom_meeting_url: Option<String>,
    pub zoom_meeting_password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
}

impl Company {
    pub fn meeting(&self) -> Option<MeetingTriple> {
        match (
            &self.zoom_meeting_id,
            &self.zoom_meeting_url,
            &self.zoom_meeting_password,
        ) {
            (Some(id), Some(url), Some(password)) => Some(MeetingTriple {
                meeting_id: id.clone(),
                join_url: url.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub company_id: i64,
    pub message_type: MessageType,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
