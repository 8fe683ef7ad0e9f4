use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use huddle_db::models::{NewUser, UserUpdate};
use huddle_types::api::{BlockUserRequest, RegisterRequest};
use huddle_types::events::GatewayEvent;
use huddle_types::models::{Role, User};

use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::guard::{self, Action, Identity};
use crate::session::CurrentUser;
use crate::state::{AppState, AppStateInner};

const MIN_PASSWORD_LEN: usize = 6;

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

fn validate(req: &RegisterRequest) -> ApiResult<()> {
    let invalid = |msg: &str| Err(AppError::Validation(msg.to_string()));

    if !is_plausible_email(req.email.trim()) {
        return invalid("Invalid email address");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return invalid("Password must be at least 6 characters");
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return invalid("First and last name are required");
    }
    if req.role.requires_company() && req.company_id.is_none() {
        return invalid("A company is required for this role");
    }
    Ok(())
}

/// Shared account creation for self-registration and the admin endpoints.
///
/// Checks run in this order: payload shape, duplicate email, the creator's
/// permission, then company existence. The admin endpoints gate on
/// permission before calling this.
pub async fn create_account(
    state: &AppStateInner,
    caller: Option<&Identity>,
    req: RegisterRequest,
) -> ApiResult<User> {
    validate(&req)?;

    let email = req.email.trim().to_string();
    let lookup = email.clone();
    if state
        .run_db(move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(AppError::DuplicateEmail);
    }

    guard::require(
        caller,
        &Action::CreateUser {
            role: req.role,
            company_id: req.company_id,
        },
    )?;

    if let Some(company_id) = req.company_id {
        if state.run_db(move |db| db.get_company(company_id)).await?.is_none() {
            return Err(AppError::Validation("Company not found".into()));
        }
    }

    let password_hash = state.hash_password(req.password).await?;
    let new_user = NewUser {
        email,
        password_hash,
        role: req.role,
        company_id: req.company_id,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        is_active: req.is_active.unwrap_or(true),
        created_by: caller.map(|c| c.user_id),
    };

    let row = state
        .run_db(move |db| db.create_user(&new_user))
        .await
        .map_err(|e| match e {
            AppError::Internal(inner) if huddle_db::is_unique_violation(&inner) => AppError::DuplicateEmail,
            other => other,
        })?;

    info!(
        "User {} created as {} by {:?}",
        row.id,
        row.role,
        caller.map(|c| c.user_id)
    );
    Ok(row.into())
}

pub async fn create_company_admin(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.role != Role::CompanyAdmin {
        return Err(AppError::Validation("Invalid user data".into()));
    }
    let identity = current.identity();
    guard::require(Some(&identity), &Action::CreateUser { role: req.role, company_id: req.company_id })?;
    let user = create_account(&state, Some(&identity), req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn create_employee(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.role != Role::Employee {
        return Err(AppError::Validation("Invalid user data".into()));
    }
    let identity = current.identity();
    guard::require(Some(&identity), &Action::CreateUser { role: req.role, company_id: req.company_id })?;
    let user = create_account(&state, Some(&identity), req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<User>>> {
    let identity = current.identity();
    guard::require(Some(&identity), &Action::ListUsers)?;

    let rows = match (identity.role, identity.company_id) {
        (Role::SuperAdmin, _) => {
            state
                .run_db(|db| {
                    let mut rows = db.get_users_by_role(Role::CompanyAdmin)?;
                    rows.extend(db.get_users_by_role(Role::Employee)?);
                    Ok(rows)
                })
                .await?
        }
        (Role::CompanyAdmin, Some(company_id)) => {
            state.run_db(move |db| db.get_users_by_company(company_id)).await?
        }
        _ => vec![],
    };

    Ok(Json(rows.into_iter().map(User::from).collect()))
}

pub async fn set_blocked(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<BlockUserRequest>,
) -> ApiResult<Json<User>> {
    let target = state.run_db(move |db| db.get_user(user_id)).await?;
    guard::require(
        Some(&current.identity()),
        &Action::BlockUser {
            target_company: target.as_ref().and_then(|t| t.company_id),
        },
    )?;

    let is_blocked = req.is_blocked;
    let update = UserUpdate {
        is_blocked: Some(is_blocked),
        ..Default::default()
    };
    let updated = state
        .run_db(move |db| {
            let updated = db.update_user(user_id, &update)?;
            if updated.is_some() && is_blocked {
                db.delete_sessions_for_user(user_id)?;
            }
            Ok(updated)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(
        "User {} {} by {}",
        user_id,
        if is_blocked { "blocked" } else { "unblocked" },
        current.user.id
    );
    state
        .dispatcher
        .broadcast(&GatewayEvent::UserBlockChanged { user_id, is_blocked });

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_plausible_email("john@acme.com"));
        assert!(is_plausible_email("a.b+c@mail.example.org"));
        assert!(!is_plausible_email("john"));
        assert!(!is_plausible_email("@acme.com"));
        assert!(!is_plausible_email("john@acme"));
        assert!(!is_plausible_email("john@.com"));
        assert!(!is_plausible_email("jo hn@acme.com"));
        assert!(!is_plausible_email("a@b@acme.com"));
    }

    #[test]
    fn tenant_roles_need_a_company() {
        let req = RegisterRequest {
            email: "john@acme.com".into(),
            password: "secret1".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            role: Role::Employee,
            company_id: None,
            is_active: None,
        };
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));

        let req = RegisterRequest { company_id: Some(1), ..req };
        assert!(validate(&req).is_ok());

        let req = RegisterRequest { password: "12345".into(), ..req };
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));
    }
}
