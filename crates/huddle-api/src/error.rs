use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use huddle_types::api::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account has been blocked. Contact administrator.")]
    AccountBlocked,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UploadRejected(String),

    #[error("Meeting provider error: {0}")]
    Provisioning(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateEmail | AppError::UploadRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::AccountBlocked | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provisioning(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Provisioning(detail) => {
                error!("Meeting provider error: {}", detail);
                "Meeting provider is unavailable".to_string()
            }
            AppError::Internal(e) => {
                error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ErrorResponse { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;
