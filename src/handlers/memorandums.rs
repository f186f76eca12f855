use crate::{
    auth::AuthUser,
    entities::memorandum::Model as MemorandumModel,
    errors::ServiceError,
    services::memorandums::{CreateMemorandumInput, UpdateMemorandumInput},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MemorandumSummary {
    pub id: Uuid,
    pub title: String,
    pub reference_no: String,
    pub body: Option<String>,
    pub attachment_url: Option<String>,
    pub issued_on: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<MemorandumModel> for MemorandumSummary {
    fn from(model: MemorandumModel) -> Self {
        Self {
            id: model.id,
            title: model.title,
            reference_no: model.reference_no,
            body: model.body,
            attachment_url: model.attachment_url,
            issued_on: model.issued_on,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub async fn list_memorandums(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<MemorandumSummary>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (records, total) = state
        .services
        .memorandums
        .list_memorandums(query.search.as_deref(), page, limit)
        .await?;
    let items: Vec<MemorandumSummary> =
        records.into_iter().map(MemorandumSummary::from).collect();

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

pub async fn get_memorandum(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<MemorandumSummary> {
    match state.services.memorandums.get_memorandum(id).await? {
        Some(model) => Ok(Json(ApiResponse::success(MemorandumSummary::from(model)))),
        None => Err(ServiceError::NotFound(format!(
            "Memorandum {} not found",
            id
        ))),
    }
}

pub async fn create_memorandum(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateMemorandumInput>,
) -> ApiResult<MemorandumSummary> {
    let created_by = user
        .uuid()
        .map_err(|_| ServiceError::Unauthorized("Invalid actor identity".to_string()))?;
    let created = state
        .services
        .memorandums
        .create_memorandum(payload, created_by)
        .await?;
    Ok(Json(ApiResponse::success(MemorandumSummary::from(created))))
}

pub async fn update_memorandum(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMemorandumInput>,
) -> ApiResult<MemorandumSummary> {
    let updated = state
        .services
        .memorandums
        .update_memorandum(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(MemorandumSummary::from(updated))))
}

pub async fn delete_memorandum(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.memorandums.delete_memorandum(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "deleted": true
    }))))
}
