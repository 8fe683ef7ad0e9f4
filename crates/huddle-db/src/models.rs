//! Database row types. These map directly to SQLite rows.
//! Distinct from huddle-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use tracing::warn;

use huddle_types::models::{Company, DeviceInfo, Message, MessageType, Role, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub company_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_blocked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_ip_address: Option<String>,
    /// Serialized `DeviceInfo` JSON.
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub company_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_by: Option<i64>,
}

/// Partial user update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_blocked: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_ip_address: Option<String>,
    pub device_info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompanyRow {
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

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub company_id: i64,
    pub message_type: MessageType,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub company_id: i64,
    pub message_type: MessageType,
    pub content: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let device_info = row.device_info.as_deref().and_then(|raw| {
            serde_json::from_str::<DeviceInfo>(raw)
                .map_err(|e| warn!("Corrupt device_info on user {}: {}", row.id, e))
                .ok()
        });

        User {
            id: row.id,
            email: row.email,
            role: row.role,
            company_id: row.company_id,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.is_active,
            is_blocked: row.is_blocked,
            last_login_at: row.last_login_at,
            last_ip_address: row.last_ip_address,
            device_info,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
        }
    }
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            zoom_meeting_id: row.zoom_meeting_id,
            zoom_meeting_url: row.zoom_meeting_url,
            zoom_meeting_password: row.zoom_meeting_password,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            company_id: row.company_id,
            message_type: row.message_type,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}
