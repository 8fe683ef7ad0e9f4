use axum::{Extension, Json, extract::State};

use huddle_types::api::StatsResponse;
use huddle_types::models::Role;

use crate::error::ApiResult;
use crate::guard::{self, Action};
use crate::session::CurrentUser;
use crate::state::AppState;

/// GET /api/stats: dashboard counters for the super admin.
pub async fn stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<StatsResponse>> {
    guard::require(Some(&current.identity()), &Action::ViewStats)?;

    let stats = state
        .run_db(|db| {
            Ok(StatsResponse {
                companies: db.count_companies()?,
                company_admins: db.count_users_by_role(Role::CompanyAdmin)?,
                employees: db.count_users_by_role(Role::Employee)?,
                meetings: db.count_companies_with_meeting()?,
            })
        })
        .await?;

    Ok(Json(stats))
}
