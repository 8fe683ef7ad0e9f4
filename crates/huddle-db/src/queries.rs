use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{OptionalExtension, Row};

use huddle_types::models::{MeetingTriple, Role};

use crate::Database;
use crate::models::{
    CompanyRow, CompanyUpdate, MessageRow, NewCompany, NewMessage, NewUser, UserRow, UserUpdate,
};

const USER_COLUMNS: &str = "id, email, password, role, company_id, first_name, last_name, \
     is_active, is_blocked, last_login_at, last_ip_address, device_info, \
     created_at, updated_at, created_by";

const COMPANY_COLUMNS: &str = "id, name, description, is_active, zoom_meeting_id, \
     zoom_meeting_url, zoom_meeting_password, created_at, updated_at, created_by";

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, company_id, message_type, content, is_read, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        let sql = format!(
            "INSERT INTO users (email, password, role, company_id, first_name, last_name, is_active, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             RETURNING {USER_COLUMNS}"
        );
        self.with_conn(|conn| {
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.company_id,
                    user.first_name,
                    user.last_name,
                    user.is_active,
                    user.created_by,
                    Utc::now(),
                ],
                map_user,
            )?;
            Ok(row)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        self.with_conn(|conn| Ok(conn.query_row(&sql, [id], map_user).optional()?))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        self.with_conn(|conn| Ok(conn.query_row(&sql, [email], map_user).optional()?))
    }

    /// Apply a partial update and refresh `updated_at`. Returns the updated
    /// row, or `None` if the id does not exist.
    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<UserRow>> {
        let mut columns: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(v) = &update.first_name {
            columns.push("first_name");
            values.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.last_name {
            columns.push("last_name");
            values.push(Box::new(v.clone()));
        }
        if let Some(v) = update.is_active {
            columns.push("is_active");
            values.push(Box::new(v));
        }
        if let Some(v) = update.is_blocked {
            columns.push("is_blocked");
            values.push(Box::new(v));
        }
        if let Some(v) = update.last_login_at {
            columns.push("last_login_at");
            values.push(Box::new(v));
        }
        if let Some(v) = &update.last_ip_address {
            columns.push("last_ip_address");
            values.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.device_info {
            columns.push("device_info");
            values.push(Box::new(v.clone()));
        }

        let sql = update_sql("users", &columns, USER_COLUMNS);
        values.push(Box::new(Utc::now()));
        values.push(Box::new(id));

        self.with_conn(|conn| {
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            Ok(conn.query_row(&sql, params.as_slice(), map_user).optional()?)
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    pub fn get_users_by_company(&self, company_id: i64) -> Result<Vec<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE company_id = ?1 ORDER BY id");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([company_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_users_by_role(&self, role: Role) -> Result<Vec<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY id");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([role.as_str()], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The company admin that receives employee messages: the earliest
    /// created one when a tenant has several.
    pub fn get_company_admin(&self, company_id: i64) -> Result<Option<UserRow>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE company_id = ?1 AND role = 'company_admin'
             ORDER BY id LIMIT 1"
        );
        self.with_conn(|conn| Ok(conn.query_row(&sql, [company_id], map_user).optional()?))
    }

    pub fn count_users_in_company(&self, company_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE company_id = ?1",
                [company_id],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    pub fn count_users_by_role(&self, role: Role) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                [role.as_str()],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    // -- Companies --

    pub fn create_company(&self, company: &NewCompany) -> Result<CompanyRow> {
        let sql = format!(
            "INSERT INTO companies (name, description, is_active, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING {COMPANY_COLUMNS}"
        );
        self.with_conn(|conn| {
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    company.name,
                    company.description,
                    company.is_active,
                    company.created_by,
                    Utc::now(),
                ],
                map_company,
            )?;
            Ok(row)
        })
    }

    pub fn get_company(&self, id: i64) -> Result<Option<CompanyRow>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1");
        self.with_conn(|conn| Ok(conn.query_row(&sql, [id], map_company).optional()?))
    }

    pub fn get_all_companies(&self) -> Result<Vec<CompanyRow>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY id");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_company)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_company(&self, id: i64, update: &CompanyUpdate) -> Result<Option<CompanyRow>> {
        let mut columns: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(v) = &update.name {
            columns.push("name");
            values.push(Box::new(v.clone()));
        }
        if let Some(v) = &update.description {
            columns.push("description");
            values.push(Box::new(v.clone()));
        }
        if let Some(v) = update.is_active {
            columns.push("is_active");
            values.push(Box::new(v));
        }

        let sql = update_sql("companies", &columns, COMPANY_COLUMNS);
        values.push(Box::new(Utc::now()));
        values.push(Box::new(id));

        self.with_conn(|conn| {
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            Ok(conn.query_row(&sql, params.as_slice(), map_company).optional()?)
        })
    }

    pub fn delete_company(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM companies WHERE id = ?1", [id])? > 0))
    }

    /// Compare-and-set the meeting triple: only writes when the company has
    /// no meeting yet. Returns whether this call stored the triple.
    pub fn set_company_meeting_if_absent(&self, id: i64, meeting: &MeetingTriple) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE companies
                 SET zoom_meeting_id = ?2, zoom_meeting_url = ?3, zoom_meeting_password = ?4, updated_at = ?5
                 WHERE id = ?1 AND zoom_meeting_id IS NULL",
                rusqlite::params![
                    id,
                    meeting.meeting_id,
                    meeting.join_url,
                    meeting.password,
                    Utc::now(),
                ],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn count_companies(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn count_companies_with_meeting(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM companies WHERE zoom_meeting_id IS NOT NULL",
                [],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    // -- Messages --

    pub fn create_message(&self, message: &NewMessage) -> Result<MessageRow> {
        let sql = format!(
            "INSERT INTO messages (sender_id, receiver_id, company_id, message_type, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {MESSAGE_COLUMNS}"
        );
        self.with_conn(|conn| {
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    message.sender_id,
                    message.receiver_id,
                    message.company_id,
                    message.message_type.as_str(),
                    message.content,
                    Utc::now(),
                ],
                map_message,
            )?;
            Ok(row)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        self.with_conn(|conn| Ok(conn.query_row(&sql, [id], map_message).optional()?))
    }

    /// Newest first.
    pub fn get_messages_by_receiver(&self, receiver_id: i64) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id = ?1 ORDER BY id DESC"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([receiver_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest first.
    pub fn get_company_messages(&self, company_id: i64) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE company_id = ?1 ORDER BY id DESC"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([company_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns whether the message exists. Marking twice is not an error.
    pub fn mark_message_read(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.execute("UPDATE messages SET is_read = 1 WHERE id = ?1", [id])? > 0)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, sid: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (sid, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sid, user_id, expires_at, Utc::now()],
            )?;
            Ok(())
        })
    }

    /// Resolve a live session to its user. Expired sessions resolve to `None`.
    pub fn get_session_user(&self, sid: &str, now: DateTime<Utc>) -> Result<Option<UserRow>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id = (SELECT user_id FROM sessions WHERE sid = ?1 AND expires_at > ?2)"
        );
        self.with_conn(|conn| {
            Ok(conn
                .query_row(&sql, rusqlite::params![sid, now], map_user)
                .optional()?)
        })
    }

    pub fn delete_session(&self, sid: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM sessions WHERE sid = ?1", [sid])? > 0))
    }

    pub fn delete_sessions_for_user(&self, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?)
        })
    }

    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
        })
    }
}

/// `UPDATE <table> SET c1 = ?1, ..., updated_at = ?n WHERE id = ?n+1 RETURNING ...`
fn update_sql(table: &str, columns: &[&str], returning: &str) -> String {
    let mut assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    assignments.push(format!("updated_at = ?{}", columns.len() + 1));

    format!(
        "UPDATE {} SET {} WHERE id = ?{} RETURNING {}",
        table,
        assignments.join(", "),
        columns.len() + 2,
        returning
    )
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        role: parse_column(row, 3)?,
        company_id: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        is_active: row.get(7)?,
        is_blocked: row.get(8)?,
        last_login_at: row.get(9)?,
        last_ip_address: row.get(10)?,
        device_info: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        created_by: row.get(14)?,
    })
}

fn map_company(row: &Row<'_>) -> rusqlite::Result<CompanyRow> {
    Ok(CompanyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        zoom_meeting_id: row.get(4)?,
        zoom_meeting_url: row.get(5)?,
        zoom_meeting_password: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        created_by: row.get(9)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        company_id: row.get(3)?,
        message_type: parse_column(row, 4)?,
        content: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}
