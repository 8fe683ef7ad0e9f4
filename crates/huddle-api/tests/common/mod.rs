#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use huddle_api::{AppState, AppStateInner, Config, router};
use huddle_crypto::CredentialStore;
use huddle_db::Database;
use huddle_db::models::NewUser;
use huddle_types::models::Role;

pub const SUPER_EMAIL: &str = "root@system.com";
pub const SUPER_PASSWORD: &str = "admin123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
}

pub struct Reply {
    pub status: StatusCode,
    pub cookie: Option<String>,
    pub body: Value,
}

impl TestApp {
    /// Fresh in-memory app with one super admin.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let upload_dir = std::env::temp_dir().join(format!("huddle-test-{}", uuid::Uuid::new_v4()));
        let mut config = Config::development(&upload_dir);
        tweak(&mut config);

        let db = Arc::new(Database::open_in_memory().unwrap());
        // Cheap Argon2id cost so tests stay fast.
        let credentials = CredentialStore::with_cost(1024, 1, 1).unwrap();

        db.create_user(&NewUser {
            email: SUPER_EMAIL.into(),
            password_hash: credentials.hash(SUPER_PASSWORD).unwrap(),
            role: Role::SuperAdmin,
            company_id: None,
            first_name: "Root".into(),
            last_name: "Admin".into(),
            is_active: true,
            created_by: None,
        })
        .unwrap();

        let state: AppState = Arc::new(AppStateInner::new(db, credentials, config).unwrap());
        Self {
            router: router::build(state.clone()),
            state,
            upload_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Reply {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply { status, cookie, body }
    }

    pub async fn call(&self, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    /// Log in and return the session cookie (`huddle.sid=...`).
    pub async fn login(&self, email: &str, password: &str) -> String {
        let reply = self
            .call("POST", "/api/login", None, Some(json!({ "email": email, "password": password })))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);
        reply.cookie.expect("login sets a cookie")
    }

    pub async fn login_super(&self) -> String {
        self.login(SUPER_EMAIL, SUPER_PASSWORD).await
    }

    pub async fn create_company(&self, cookie: &str, name: &str) -> i64 {
        let reply = self
            .call("POST", "/api/companies", Some(cookie), Some(json!({ "name": name })))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["id"].as_i64().unwrap()
    }

    pub async fn create_user(&self, cookie: &str, role: &str, email: &str, company_id: i64) -> i64 {
        let path = match role {
            "company_admin" => "/api/users/create-company-admin",
            _ => "/api/users/create-employee",
        };
        let reply = self
            .call(
                "POST",
                path,
                Some(cookie),
                Some(json!({
                    "email": email,
                    "password": "secret123",
                    "firstName": "Test",
                    "lastName": "User",
                    "role": role,
                    "companyId": company_id,
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["id"].as_i64().unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}
