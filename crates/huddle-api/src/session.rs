//! Server-side sessions behind a signed `huddle.sid` cookie.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::Utc;
use tracing::{info, warn};

use huddle_crypto::tokens::generate_session_id;
use huddle_db::Database;
use huddle_types::models::User;

use crate::error::AppError;
use crate::guard::Identity;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "huddle.sid";
pub const SESSION_TTL_HOURS: i64 = 24;

/// The user behind the request's session, re-read on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub sid: String,
}

impl CurrentUser {
    pub fn identity(&self) -> Identity {
        Identity::from(&self.user)
    }
}

fn jar(state: &AppState, headers: &HeaderMap) -> SignedCookieJar {
    SignedCookieJar::from_headers(headers, state.cookie_key.clone())
}

/// Resolve the request's session. A forged or expired cookie is simply no
/// session; a blocked user's session is deleted and rejected.
pub async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<Option<CurrentUser>, AppError> {
    let Some(sid) = jar(state, headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
    else {
        return Ok(None);
    };

    let lookup = sid.clone();
    let Some(row) = state
        .run_db(move |db| db.get_session_user(&lookup, Utc::now()))
        .await?
    else {
        return Ok(None);
    };

    if row.is_blocked {
        warn!("Rejecting session of blocked user {}", row.id);
        let stale = sid.clone();
        state.run_db(move |db| db.delete_session(&stale)).await?;
        return Err(AppError::AccountBlocked);
    }

    Ok(Some(CurrentUser {
        user: row.into(),
        sid,
    }))
}

/// Open a session for `user_id` and return the jar carrying its cookie.
pub async fn start(state: &AppState, headers: &HeaderMap, user_id: i64) -> Result<SignedCookieJar, AppError> {
    let sid = generate_session_id();
    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS);

    let stored = sid.clone();
    state
        .run_db(move |db| db.create_session(&stored, user_id, expires_at))
        .await?;

    let cookie = Cookie::build((SESSION_COOKIE, sid))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build();

    Ok(jar(state, headers).add(cookie))
}

/// Drop the request's session, if any, and return a jar that clears the cookie.
pub async fn end(state: &AppState, headers: &HeaderMap) -> Result<SignedCookieJar, AppError> {
    let jar = jar(state, headers);
    if let Some(sid) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        state.run_db(move |db| db.delete_session(&sid)).await?;
    }
    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

/// Middleware for protected routes: 401 without a live session, otherwise
/// inserts [`CurrentUser`] into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = resolve(&state, req.headers())
        .await?
        .ok_or(AppError::Unauthenticated)?;
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

/// Background task that deletes expired sessions.
pub async fn run_sweeper(db: Arc<Database>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = db.clone();
        match tokio::task::spawn_blocking(move || db.delete_expired_sessions(Utc::now())).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Session sweep: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Session sweep error: {}", e),
            Err(e) => warn!("Session sweep task failed: {}", e),
        }
    }
}
