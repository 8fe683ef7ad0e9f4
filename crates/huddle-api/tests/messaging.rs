mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use huddle_api::config::{DeploymentMode, ZoomConfig};

async fn acme(app: &TestApp) -> (String, i64, String, String) {
    let root = app.login_super().await;
    let acme = app.create_company(&root, "Acme").await;
    app.create_user(&root, "company_admin", "boss@acme.com", acme).await;
    app.create_user(&root, "employee", "john@acme.com", acme).await;
    let admin = app.login("boss@acme.com", "secret123").await;
    let john = app.login("john@acme.com", "secret123").await;
    (root, acme, admin, john)
}

#[tokio::test]
async fn sending_without_an_admin_is_not_found() {
    let app = TestApp::new();
    let root = app.login_super().await;
    let lonely = app.create_company(&root, "Lonely").await;
    app.create_user(&root, "employee", "solo@lonely.com", lonely).await;
    let solo = app.login("solo@lonely.com", "secret123").await;

    let reply = app
        .call("POST", "/api/messages/send", Some(&solo), Some(json!({ "content": "anyone?" })))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "No company admin found");
}

#[tokio::test]
async fn only_employees_send() {
    let app = TestApp::new();
    let (root, _, admin, john) = acme(&app).await;

    for cookie in [&root, &admin] {
        let reply = app
            .call("POST", "/api/messages/send", Some(cookie), Some(json!({ "content": "hi" })))
            .await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
    }

    let blank = app
        .call("POST", "/api/messages/send", Some(&john), Some(json!({ "content": "   " })))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let missing = app.call("POST", "/api/messages/send", Some(&john), Some(json!({}))).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explicit_recipient_must_be_own_admin() {
    let app = TestApp::new();
    let (root, _, _, john) = acme(&app).await;
    let globex = app.create_company(&root, "Globex").await;
    let other_admin = app.create_user(&root, "company_admin", "boss@globex.com", globex).await;

    let reply = app
        .call(
            "POST",
            "/api/messages/send",
            Some(&john),
            Some(json!({ "content": "psst", "receiverId": other_admin })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn first_admin_receives_by_default() {
    let app = TestApp::new();
    let (root, acme, _, john) = acme(&app).await;
    let second = app.create_user(&root, "company_admin", "deputy@acme.com", acme).await;

    let to_first = app
        .call("POST", "/api/messages/send", Some(&john), Some(json!({ "content": "one" })))
        .await;
    assert_eq!(to_first.status, StatusCode::CREATED);
    assert_ne!(to_first.body["receiverId"], second);

    let to_second = app
        .call(
            "POST",
            "/api/messages/send",
            Some(&john),
            Some(json!({ "content": "two", "receiverId": second })),
        )
        .await;
    assert_eq!(to_second.status, StatusCode::CREATED);
    assert_eq!(to_second.body["receiverId"], second);
    assert_eq!(to_second.body["messageType"], "text");
}

#[tokio::test]
async fn marking_read_is_idempotent() {
    let app = TestApp::new();
    let (_, _, admin, john) = acme(&app).await;

    let sent = app
        .call("POST", "/api/messages/send", Some(&john), Some(json!({ "content": "ping" })))
        .await;
    let id = sent.body["id"].as_i64().unwrap();
    let uri = format!("/api/messages/{}/read", id);

    for _ in 0..2 {
        let reply = app.call("PUT", &uri, Some(&admin), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["isRead"], true);
    }

    let missing = app.call("PUT", "/api/messages/4242/read", Some(&admin), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_only_read_their_own_tenant() {
    let app = TestApp::new();
    let (root, _, _, john) = acme(&app).await;
    let globex = app.create_company(&root, "Globex").await;
    app.create_user(&root, "company_admin", "boss@globex.com", globex).await;
    let outsider = app.login("boss@globex.com", "secret123").await;

    let sent = app
        .call("POST", "/api/messages/send", Some(&john), Some(json!({ "content": "private" })))
        .await;
    let id = sent.body["id"].as_i64().unwrap();

    let inbox = app.call("GET", "/api/messages", Some(&outsider), None).await;
    assert_eq!(inbox.body, json!([]));

    let mark = app
        .call("PUT", &format!("/api/messages/{}/read", id), Some(&outsider), None)
        .await;
    assert_eq!(mark.status, StatusCode::FORBIDDEN);

    let own = app
        .call("PUT", &format!("/api/messages/{}/read", id), Some(&john), None)
        .await;
    assert_eq!(own.status, StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_meeting_requests_converge() {
    let app = Arc::new(TestApp::new());
    let (_, _, admin, _) = acme(&app).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let cookie = admin.clone();
        handles.push(tokio::spawn(async move {
            app.call("POST", "/api/zoom/create-meeting", Some(&cookie), None).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let reply = handle.await.unwrap();
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        ids.push(reply.body["id"].as_str().unwrap().to_string());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "meetings diverged: {ids:?}");

    let companies = app.call("GET", "/api/companies", Some(&admin), None).await;
    assert_eq!(companies.body[0]["zoomMeetingId"], ids[0].as_str());
    assert_eq!(companies.body[0]["zoomMeetingPassword"].as_str().unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_company_listings_agree_on_one_meeting() {
    let app = Arc::new(TestApp::new());
    let (_, _, admin, john) = acme(&app).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        let cookie = if i % 2 == 0 { admin.clone() } else { john.clone() };
        handles.push(tokio::spawn(async move {
            app.call("GET", "/api/companies", Some(&cookie), None).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let reply = handle.await.unwrap();
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        let id = reply.body[0]["zoomMeetingId"].as_str().unwrap().to_string();
        ids.push(id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "meetings diverged: {ids:?}");

    let stored = app.call("GET", "/api/companies", Some(&admin), None).await;
    assert_eq!(stored.body[0]["zoomMeetingId"], ids[0].as_str());
}

#[tokio::test]
async fn super_admin_cannot_create_meetings() {
    let app = TestApp::new();
    let root = app.login_super().await;
    let reply = app.call("POST", "/api/zoom/create-meeting", Some(&root), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn meeting_info_needs_a_meeting() {
    let app = TestApp::new();
    let (root, _, admin, john) = acme(&app).await;

    let none_yet = app.call("GET", "/api/zoom/meeting-info", Some(&john), None).await;
    assert_eq!(none_yet.status, StatusCode::NOT_FOUND);

    let no_company = app.call("GET", "/api/zoom/meeting-info", Some(&root), None).await;
    assert_eq!(no_company.status, StatusCode::BAD_REQUEST);

    let created = app.call("POST", "/api/zoom/create-meeting", Some(&admin), None).await;
    let meeting_id = created.body["id"].as_str().unwrap().to_string();
    assert_eq!(meeting_id.len(), 9);
    assert_eq!(created.body["topic"], "Acme - 24/7 Company Meeting");

    let info = app.call("GET", "/api/zoom/meeting-info", Some(&john), None).await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["id"], meeting_id.as_str());
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let app = TestApp::with_config(|config| {
        config.mode = DeploymentMode::Production;
        config.zoom = Some(ZoomConfig {
            account_id: "acct".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            // Nothing listens on the discard port.
            api_base: "http://127.0.0.1:9/v2".into(),
            oauth_base: "http://127.0.0.1:9".into(),
        });
    });
    let (_, _, admin, _) = acme(&app).await;

    let reply = app.call("POST", "/api/zoom/create-meeting", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert!(!reply.body["message"].as_str().unwrap().contains("127.0.0.1"));
}
