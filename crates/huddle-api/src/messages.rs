use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use huddle_db::models::NewMessage;
use huddle_types::api::SendMessageRequest;
use huddle_types::events::GatewayEvent;
use huddle_types::models::{Message, MessageType, Role};

use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::guard::{self, Action, Identity};
use crate::session::CurrentUser;
use crate::state::{AppState, AppStateInner};

/// Sender's company and the admin who will receive the message.
pub struct Route {
    pub company_id: i64,
    pub receiver_id: i64,
}

/// Work out where an employee's message goes.
///
/// Without an explicit recipient this is the company's first admin (lowest
/// id). An explicit recipient must be an admin of the sender's company.
pub async fn route_to_admin(
    state: &AppStateInner,
    sender: &Identity,
    explicit: Option<i64>,
) -> ApiResult<Route> {
    guard::require(Some(sender), &Action::SendMessage)?;
    let company_id = sender
        .company_id
        .ok_or_else(|| AppError::Validation("No company assigned".into()))?;

    let receiver_id = match explicit {
        Some(receiver_id) => {
            let receiver = state.run_db(move |db| db.get_user(receiver_id)).await?;
            match receiver {
                Some(r) if r.role == Role::CompanyAdmin && r.company_id == Some(company_id) => r.id,
                _ => {
                    return Err(AppError::Validation(
                        "Recipient must be an admin of your company".into(),
                    ));
                }
            }
        }
        None => {
            state
                .run_db(move |db| db.get_company_admin(company_id))
                .await?
                .ok_or_else(|| AppError::NotFound("No company admin found".into()))?
                .id
        }
    };

    Ok(Route {
        company_id,
        receiver_id,
    })
}

/// Persist a message and announce it on the gateway.
pub async fn deliver(
    state: &AppStateInner,
    sender_id: i64,
    route: Route,
    message_type: MessageType,
    content: String,
) -> ApiResult<Message> {
    let new_message = NewMessage {
        sender_id,
        receiver_id: route.receiver_id,
        company_id: route.company_id,
        message_type,
        content,
    };
    let message: Message = state
        .run_db(move |db| db.create_message(&new_message))
        .await?
        .into();

    debug!(
        "Message {} ({}) from {} to {}",
        message.id,
        message.message_type.as_str(),
        message.sender_id,
        message.receiver_id
    );
    state.dispatcher.broadcast(&GatewayEvent::MessageCreated {
        message: message.clone(),
    });

    Ok(message)
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let identity = current.identity();
    let route = route_to_admin(&state, &identity, req.receiver_id).await?;

    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Invalid message data".into()));
    }

    let message = deliver(&state, identity.user_id, route, MessageType::Text, content.to_string()).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/messages: admins see their company's inbox, employees what was
/// addressed to them.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Message>>> {
    let identity = current.identity();
    guard::require(Some(&identity), &Action::ListMessages)?;

    let rows = match (identity.role, identity.company_id) {
        (Role::CompanyAdmin, Some(company_id)) => {
            state.run_db(move |db| db.get_company_messages(company_id)).await?
        }
        (Role::Employee, _) => {
            let user_id = identity.user_id;
            state.run_db(move |db| db.get_messages_by_receiver(user_id)).await?
        }
        _ => vec![],
    };

    Ok(Json(rows.into_iter().map(Message::from).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
) -> ApiResult<Json<Message>> {
    let message = state
        .run_db(move |db| db.get_message(message_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

    guard::require(
        Some(&current.identity()),
        &Action::MarkMessageRead {
            company_id: message.company_id,
            receiver_id: message.receiver_id,
        },
    )?;

    if !state.run_db(move |db| db.mark_message_read(message_id)).await? {
        return Err(AppError::NotFound("Message not found".into()));
    }

    let mut message = Message::from(message);
    message.is_read = true;
    Ok(Json(message))
}
