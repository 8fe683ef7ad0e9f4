use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, companies, database, meetings, messages, session, stats, users, voice};

/// The full HTTP surface: REST API, `/ws` relay and uploaded files.
pub fn build(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/ws", get(ws_upgrade));

    let protected = Router::new()
        .route("/api/user", get(auth::current_user))
        .route("/api/users", get(users::list_users))
        .route("/api/users/create-company-admin", post(users::create_company_admin))
        .route("/api/users/create-employee", post(users::create_employee))
        .route("/api/users/{id}/block", patch(users::set_blocked))
        .route(
            "/api/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/api/companies/{id}",
            put(companies::update_company).delete(companies::delete_company),
        )
        .route("/api/zoom/create-meeting", post(meetings::create_meeting))
        .route("/api/zoom/meeting-info", get(meetings::meeting_info))
        .route("/api/messages", get(messages::list_messages))
        .route("/api/messages/send", post(messages::send_message))
        .route("/api/messages/{id}/read", put(messages::mark_read))
        .route(
            "/api/messages/voice",
            post(voice::upload_voice).layer(DefaultBodyLimit::max(voice::MAX_BODY_BYTES)),
        )
        .route("/api/database/query", post(database::run_query))
        .route("/api/stats", get(stats::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| huddle_gateway::connection::handle_connection(socket, dispatcher))
}
