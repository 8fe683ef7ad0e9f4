use axum::{Extension, Json, extract::State};
use tracing::{info, warn};

use huddle_db::QueryMode;
use huddle_types::api::{QueryRequest, QueryResult};

use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::guard::{self, Action};
use crate::session::CurrentUser;
use crate::state::AppState;

const DESTRUCTIVE_KEYWORDS: &[&str] = &["DROP", "DELETE", "TRUNCATE", "ALTER"];

fn is_destructive(query: &str) -> bool {
    let upper = query.to_uppercase();
    DESTRUCTIVE_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

/// POST /api/database/query: super-admin SQL console.
///
/// SQL failures come back as `{"status": "error"}` with 200. In production
/// destructive keywords are refused outright and everything else runs
/// read-only.
pub async fn run_query(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<QueryRequest>,
) -> ApiResult<Json<QueryResult>> {
    guard::require(Some(&current.identity()), &Action::RunQuery)?;

    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Invalid query".into()))?;

    let mode = if state.config.is_production() {
        if is_destructive(&query) {
            warn!("User {} attempted a destructive query", current.user.id);
            return Err(AppError::Forbidden(
                "Destructive queries not allowed in production".into(),
            ));
        }
        QueryMode::ReadOnly
    } else {
        QueryMode::ReadWrite
    };

    info!("User {} running console query ({:?})", current.user.id, mode);
    let result = state.run_db(move |db| Ok(db.execute_query(&query, mode))).await?;
    Ok(Json(result))
}
