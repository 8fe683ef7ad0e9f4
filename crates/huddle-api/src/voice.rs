use std::path::Path;

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use huddle_types::models::MessageType;

use crate::error::{ApiResult, AppError};
use crate::messages::{deliver, route_to_admin};
use crate::session::CurrentUser;
use crate::state::AppState;

/// 10 MiB per voice note.
pub const MAX_VOICE_BYTES: usize = 10 * 1024 * 1024;

/// Request body cap for the upload route: the file plus multipart framing.
pub const MAX_BODY_BYTES: usize = MAX_VOICE_BYTES + 1024 * 1024;

/// Accepted MIME types and the extension the file is stored under.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("audio/wav", "wav"),
    ("audio/mpeg", "mp3"),
    ("audio/webm", "webm"),
    ("audio/ogg", "ogg"),
];

fn extension_for(content_type: &str) -> Option<&'static str> {
    // Browsers send e.g. "audio/webm;codecs=opus".
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// POST /api/messages/voice: multipart field `voice`, stored under
/// `{upload_dir}/voice/` and sent to the company admin.
pub async fn upload_voice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let identity = current.identity();
    let route = route_to_admin(&state, &identity, None).await?;

    let mut multipart =
        multipart.map_err(|_| AppError::UploadRejected("Expected a multipart upload".into()))?;

    let mut upload: Option<(Vec<u8>, &'static str)> = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::UploadRejected("Malformed multipart body".into()))?
    {
        if field.name() != Some("voice") {
            continue;
        }

        let ext = field
            .content_type()
            .and_then(extension_for)
            .ok_or_else(|| AppError::UploadRejected("Unsupported audio format".into()))?;

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|_| AppError::UploadRejected("Voice file too large".into()))?
        {
            if data.len() + chunk.len() > MAX_VOICE_BYTES {
                return Err(AppError::UploadRejected("Voice file too large".into()));
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((data, ext));
        break;
    }

    let (data, ext) = upload
        .filter(|(data, _)| !data.is_empty())
        .ok_or_else(|| AppError::UploadRejected("No voice file uploaded".into()))?;

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    save(&state.config.upload_dir.join("voice"), &file_name, &data).await?;
    info!(
        "Voice note {} ({} bytes) uploaded by {}",
        file_name,
        data.len(),
        identity.user_id
    );

    let content = format!("/uploads/voice/{}", file_name);
    let message = deliver(&state, identity.user_id, route, MessageType::Voice, content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn save(dir: &Path, file_name: &str, data: &[u8]) -> ApiResult<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", dir.display(), e);
        AppError::Internal(e.into())
    })?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, data).await.map_err(|e| {
        error!("Failed to write {}: {}", path.display(), e);
        AppError::Internal(e.into())
    })
}
