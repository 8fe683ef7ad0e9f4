use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use huddle_db::models::UserUpdate;
use huddle_types::api::{LoginRequest, RegisterRequest};
use huddle_types::models::User;

use crate::device::parse_user_agent;
use crate::error::{ApiResult, AppError};
use crate::extract::{ApiJson, ClientIp};
use crate::session::{self, CurrentUser};
use crate::state::AppState;
use crate::users::create_account;

/// POST /api/register: create an account and log straight into it.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let caller = session::resolve(&state, &headers).await?;
    let identity = caller.as_ref().map(CurrentUser::identity);

    let user = create_account(&state, identity.as_ref(), req).await?;

    // The new account replaces whatever session the caller had.
    if let Some(previous) = caller {
        state.run_db(move |db| db.delete_session(&previous.sid)).await?;
    }
    let jar = session::start(&state, &headers, user.id).await?;

    Ok((StatusCode::CREATED, jar, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Invalid login data".into()));
    }

    let email = req.email.trim().to_string();
    let row = state.run_db(move |db| db.get_user_by_email(&email)).await?;

    // Unknown email and wrong password are indistinguishable to the caller.
    let Some(row) = row else {
        return Err(AppError::InvalidCredentials);
    };
    if !state.verify_password(req.password, row.password.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }
    if row.is_blocked {
        warn!("Blocked user {} attempted to log in", row.id);
        return Err(AppError::AccountBlocked);
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let device = parse_user_agent(user_agent);

    let user_id = row.id;
    let telemetry = match serde_json::to_string(&device) {
        Ok(device_info) => {
            let update = UserUpdate {
                last_login_at: Some(Utc::now()),
                last_ip_address: Some(ip.clone()),
                device_info: Some(device_info),
                ..Default::default()
            };
            state.run_db(move |db| db.update_user(user_id, &update)).await
        }
        Err(e) => Err(AppError::Internal(e.into())),
    };

    let user: User = match telemetry {
        Ok(Some(updated)) => updated.into(),
        Ok(None) => row.into(),
        Err(e) => {
            warn!("Failed to record login telemetry for user {}: {}", user_id, e);
            row.into()
        }
    };

    let jar = session::start(&state, &headers, user.id).await?;
    info!("User {} logged in from {} ({}, {})", user.id, ip, device.browser, device.os);

    Ok((jar, Json(user)))
}

/// POST /api/logout: always succeeds.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let jar = session::end(&state, &headers).await?;
    Ok((jar, StatusCode::OK))
}

pub async fn current_user(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}
