use axum::{Extension, Json, extract::State};
use serde_json::Value;
use tracing::{info, warn};

use huddle_types::api::MeetingDetails;
use huddle_types::models::{Company, MeetingTriple};

use crate::error::{ApiResult, AppError};
use crate::guard::{self, Action};
use crate::provisioner::meeting_topic;
use crate::session::CurrentUser;
use crate::state::{AppState, AppStateInner};

/// Return the company's meeting, provisioning one if it has none yet.
///
/// Concurrent callers may each provision a meeting; only the first write
/// sticks, and the losers delete theirs at the provider.
pub async fn ensure_company_meeting(state: &AppStateInner, company_id: i64) -> ApiResult<MeetingDetails> {
    let company = load_company(state, company_id).await?;
    let topic = meeting_topic(&company.name);

    if let Some(existing) = company.meeting() {
        return Ok(details(existing, topic));
    }

    let created = state
        .provisioner
        .create_meeting(&topic)
        .await
        .map_err(|e| AppError::Provisioning(format!("{:#}", e)))?;

    let triple = MeetingTriple {
        meeting_id: created.id.clone(),
        join_url: created.join_url.clone(),
        password: created.password.clone(),
    };
    let stored = state
        .run_db(move |db| db.set_company_meeting_if_absent(company_id, &triple))
        .await?;

    if stored {
        info!("Meeting {} provisioned for company {}", created.id, company_id);
        return Ok(created);
    }

    warn!(
        "Company {} already has a meeting, discarding {}",
        company_id, created.id
    );
    if !state.provisioner.delete_meeting(&created.id).await {
        warn!("Orphaned meeting {} could not be deleted", created.id);
    }

    load_company(state, company_id)
        .await?
        .meeting()
        .map(|m| details(m, topic))
        .ok_or_else(|| AppError::NotFound("No meeting found for this company".into()))
}

async fn load_company(state: &AppStateInner, company_id: i64) -> ApiResult<Company> {
    state
        .run_db(move |db| db.get_company(company_id))
        .await?
        .map(Company::from)
        .ok_or_else(|| AppError::NotFound("Company not found".into()))
}

fn details(triple: MeetingTriple, topic: String) -> MeetingDetails {
    MeetingDetails {
        id: triple.meeting_id,
        join_url: triple.join_url,
        password: triple.password,
        topic,
    }
}

/// POST /api/zoom/create-meeting: idempotent.
pub async fn create_meeting(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<MeetingDetails>> {
    let identity = current.identity();
    guard::require(
        Some(&identity),
        &Action::CreateMeeting {
            company_id: identity.company_id,
        },
    )?;
    let company_id = identity
        .company_id
        .ok_or_else(|| AppError::Validation("No company assigned".into()))?;

    Ok(Json(ensure_company_meeting(&state, company_id).await?))
}

pub async fn meeting_info(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let identity = current.identity();
    guard::require(Some(&identity), &Action::ViewMeeting)?;
    let company_id = identity
        .company_id
        .ok_or_else(|| AppError::Validation("No company assigned".into()))?;

    let meeting_id = state
        .run_db(move |db| db.get_company(company_id))
        .await?
        .and_then(|row| Company::from(row).meeting())
        .map(|m| m.meeting_id)
        .ok_or_else(|| AppError::NotFound("No meeting found for this company".into()))?;

    let info = state
        .provisioner
        .get_meeting_info(&meeting_id)
        .await
        .map_err(|e| AppError::Provisioning(format!("{:#}", e)))?;
    Ok(Json(info))
}
