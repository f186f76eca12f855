use crate::{
    entities::item::{ItemStatus, Model as ItemModel},
    errors::ServiceError,
    services::items::{CreateItemInput, ItemFilter, UpdateItemInput},
    services::reports,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default)]
pub struct ItemListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// Case-insensitive name search
    pub search: Option<String>,
    /// Optional status filter
    pub status: Option<String>,
    /// Include archived items (default false)
    pub include_archived: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit: String,
    pub reorder_point: i32,
    pub status: ItemStatus,
    pub is_archived: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ItemModel> for ItemSummary {
    fn from(model: ItemModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            quantity: model.quantity,
            unit: model.unit,
            reorder_point: model.reorder_point,
            status: model.status,
            is_archived: model.is_archived,
            image_url: model.image_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn parse_status(value: &str) -> Result<ItemStatus, ServiceError> {
    match value.to_ascii_uppercase().as_str() {
        "AVAILABLE" => Ok(ItemStatus::Available),
        "OUT_OF_STOCK" => Ok(ItemStatus::OutOfStock),
        "FOR_REORDER" => Ok(ItemStatus::ForReorder),
        "PHASED_OUT" => Ok(ItemStatus::PhasedOut),
        "DISCONTINUED" => Ok(ItemStatus::Discontinued),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown item status '{}'",
            other
        ))),
    }
}

fn filter_from_query(query: &ItemListQuery) -> Result<ItemFilter, ServiceError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    Ok(ItemFilter {
        search: query.search.clone(),
        status,
        include_archived: query.include_archived.unwrap_or(false),
    })
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> ApiResult<PaginatedResponse<ItemSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let filter = filter_from_query(&query)?;

    let (records, total) = state.services.items.list_items(filter, page, limit).await?;
    let items: Vec<ItemSummary> = records.into_iter().map(ItemSummary::from).collect();

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ItemSummary> {
    match state.services.items.get_item(id).await? {
        Some(model) => Ok(Json(ApiResponse::success(ItemSummary::from(model)))),
        None => Err(ServiceError::NotFound(format!("Item {} not found", id))),
    }
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemInput>,
) -> ApiResult<ItemSummary> {
    let created = state.services.items.create_item(payload).await?;
    Ok(Json(ApiResponse::success(ItemSummary::from(created))))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemInput>,
) -> ApiResult<ItemSummary> {
    let updated = state.services.items.update_item(id, payload).await?;
    Ok(Json(ApiResponse::success(ItemSummary::from(updated))))
}

pub async fn archive_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ItemSummary> {
    let archived = state.services.items.archive_item(id).await?;
    Ok(Json(ApiResponse::success(ItemSummary::from(archived))))
}

pub async fn export_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> Result<Response, ServiceError> {
    let filter = filter_from_query(&query)?;
    let records = state.services.items.all_items(filter).await?;
    let body = reports::items_to_csv(&records)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"items.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
