use crate::{
    auth::AuthUser,
    entities::attachment,
    errors::ServiceError,
    events::Event,
    services::storage::sanitize_filename,
    ApiResponse, ApiResult, AppState,
};
use axum::extract::{Extension, Multipart, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Content types accepted by the upload endpoint: images plus office
/// documents attached to memorandums.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub object_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<attachment::Model> for AttachmentResponse {
    fn from(model: attachment::Model) -> Self {
        Self {
            id: model.id,
            object_key: model.object_key,
            url: model.url,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            created_at: model.created_at,
        }
    }
}

/// Accepts a multipart form with a single `file` field, stores the object,
/// and records an attachment row pointing at it.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<AttachmentResponse> {
    let uploaded_by = user
        .uuid()
        .map_err(|_| ServiceError::Unauthorized("Invalid actor identity".to_string()))?;

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                return Err(ServiceError::ValidationError(
                    "Multipart form must contain a 'file' field".to_string(),
                ))
            }
            Err(e) => {
                return Err(ServiceError::ValidationError(format!(
                    "Malformed multipart payload: {e}"
                )))
            }
        }
    };

    let filename = field
        .file_name()
        .map(sanitize_filename)
        .unwrap_or_else(|| "file".to_string());
    let content_type = field
        .content_type()
        .map(|ct| ct.to_string())
        .ok_or_else(|| {
            ServiceError::ValidationError("Uploaded file must declare a content type".to_string())
        })?;

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ServiceError::ValidationError(format!(
            "Content type '{}' is not allowed",
            content_type
        )));
    }

    let bytes = field
        .bytes()
        .await
        .map_err(|e| ServiceError::ValidationError(format!("Failed to read upload: {e}")))?;

    let max_bytes = state.config.storage.upload_max_bytes;
    if bytes.len() > max_bytes {
        return Err(ServiceError::ValidationError(format!(
            "Upload exceeds the {} byte limit",
            max_bytes
        )));
    }
    if bytes.is_empty() {
        return Err(ServiceError::ValidationError(
            "Uploaded file is empty".to_string(),
        ));
    }

    let attachment_id = Uuid::new_v4();
    let key = format!("uploads/{}/{}", attachment_id, filename);
    let size_bytes = bytes.len() as i64;

    let stored = state
        .services
        .storage
        .put(&key, bytes, &content_type)
        .await?;

    let now = Utc::now();
    let recorded = attachment::ActiveModel {
        id: Set(attachment_id),
        object_key: Set(stored.key.clone()),
        url: Set(stored.url),
        content_type: Set(content_type),
        size_bytes: Set(size_bytes),
        uploaded_by: Set(uploaded_by),
        created_at: Set(now),
    }
    .insert(&*state.db)
    .await
    .map_err(ServiceError::DatabaseError)?;

    if let Err(e) = state
        .event_sender
        .send(Event::FileUploaded {
            attachment_id,
            object_key: stored.key,
        })
        .await
    {
        warn!(error = %e, attachment_id = %attachment_id, "Failed to send upload event");
    }

    Ok(Json(ApiResponse::success(AttachmentResponse::from(
        recorded,
    ))))
}
