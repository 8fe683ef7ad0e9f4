use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use huddle_db::models::{CompanyUpdate, NewCompany};
use huddle_types::api::{CreateCompanyRequest, UpdateCompanyRequest};
use huddle_types::models::{Company, Role};

use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::guard::{self, Action};
use crate::meetings::ensure_company_meeting;
use crate::session::CurrentUser;
use crate::state::AppState;

fn clean_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Company name is required".into()));
    }
    Ok(name.to_string())
}

pub async fn create_company(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateCompanyRequest>,
) -> ApiResult<impl IntoResponse> {
    guard::require(Some(&current.identity()), &Action::CreateCompany)?;

    let new_company = NewCompany {
        name: clean_name(&req.name)?,
        description: req.description,
        is_active: req.is_active.unwrap_or(true),
        created_by: Some(current.user.id),
    };
    let row = state.run_db(move |db| db.create_company(&new_company)).await?;
    info!("Company {} '{}' created by {}", row.id, row.name, current.user.id);

    Ok((StatusCode::CREATED, Json(Company::from(row))))
}

/// GET /api/companies: super admins see every company, everyone else their
/// own. Companies without a meeting get one on the way out.
pub async fn list_companies(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Company>>> {
    let identity = current.identity();
    guard::require(Some(&identity), &Action::ViewCompanies)?;

    let load = move |db: &huddle_db::Database| match (identity.role, identity.company_id) {
        (Role::SuperAdmin, _) => db.get_all_companies(),
        (_, Some(company_id)) => Ok(db.get_company(company_id)?.into_iter().collect()),
        (_, None) => Ok(vec![]),
    };

    let rows = state.run_db(load).await?;
    let mut provisioned = false;
    for row in rows.iter().filter(|r| r.zoom_meeting_id.is_none()) {
        match ensure_company_meeting(&state, row.id).await {
            Ok(_) => provisioned = true,
            Err(e) => warn!("Could not provision meeting for company {}: {}", row.id, e),
        }
    }

    let rows = if provisioned { state.run_db(load).await? } else { rows };
    Ok(Json(rows.into_iter().map(Company::from).collect()))
}

pub async fn update_company(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(company_id): Path<i64>,
    ApiJson(req): ApiJson<UpdateCompanyRequest>,
) -> ApiResult<Json<Company>> {
    guard::require(Some(&current.identity()), &Action::UpdateCompany { company_id })?;

    let update = CompanyUpdate {
        name: req.name.as_deref().map(clean_name).transpose()?,
        description: req.description,
        is_active: req.is_active,
    };
    let row = state
        .run_db(move |db| db.update_company(company_id, &update))
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".into()))?;

    Ok(Json(row.into()))
}

pub async fn delete_company(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(company_id): Path<i64>,
) -> ApiResult<StatusCode> {
    guard::require(Some(&current.identity()), &Action::DeleteCompany)?;

    let (company, members) = state
        .run_db(move |db| Ok((db.get_company(company_id)?, db.count_users_in_company(company_id)?)))
        .await?;
    let company = company.ok_or_else(|| AppError::NotFound("Company not found".into()))?;
    if members > 0 {
        return Err(AppError::Validation(format!(
            "Company still has {} users",
            members
        )));
    }

    if !state.run_db(move |db| db.delete_company(company_id)).await? {
        return Err(AppError::NotFound("Company not found".into()));
    }

    if let Some(meeting_id) = company.zoom_meeting_id {
        if !state.provisioner.delete_meeting(&meeting_id).await {
            warn!("Meeting {} of deleted company {} was not removed", meeting_id, company_id);
        }
    }
    info!("Company {} deleted by {}", company_id, current.user.id);

    Ok(StatusCode::NO_CONTENT)
}
