use serde::{Deserialize, Serialize};

use crate::models::Role;

// -- Auth --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUserRequest {
    pub is_blocked: bool,
}

// -- Companies --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Absent leaves the description alone; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Wraps any field that is present, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// -- Meetings --

/// Meeting as returned by the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub id: String,
    pub join_url: String,
    pub password: String,
    pub topic: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    /// Explicit recipient. Must be a company admin of the sender's company.
    #[serde(default)]
    pub receiver_id: Option<i64>,
}

// -- Database console --

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// Outcome of a console query. Execution failures are data, not HTTP errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryResult {
    Success {
        rows: usize,
        data: Vec<serde_json::Value>,
    },
    Error {
        message: String,
    },
}

// -- Stats --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub companies: u64,
    pub company_admins: u64,
    pub employees: u64,
    pub meetings: u64,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_result_is_tagged_by_status() {
        let ok = QueryResult::Success { rows: 0, data: vec![] };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["rows"], 0);

        let err = QueryResult::Error { message: "no such table: nope".into() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "no such table: nope");
    }

    #[test]
    fn company_update_tells_null_from_absent() {
        let absent: UpdateCompanyRequest = serde_json::from_str(r#"{"name":"Acme"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: UpdateCompanyRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateCompanyRequest = serde_json::from_str(r#"{"description":"Widgets"}"#).unwrap();
        assert_eq!(set.description, Some(Some("Widgets".into())));
    }

    #[test]
    fn register_request_reads_camel_case() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.c","password":"secret1","firstName":"A","lastName":"B","role":"employee","companyId":3}"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::Employee);
        assert_eq!(req.company_id, Some(3));
    }
}
