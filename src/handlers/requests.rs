use crate::{
    auth::AuthUser,
    entities::item,
    entities::request::{RequestKind, RequestStatus},
    errors::ServiceError,
    services::reports,
    services::requests::{
        CreateRequestInput, Decision, DecisionOutcome, ReceiptOutcome, RequestFilter,
        RequestSummaryRow, RequestWithItems,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize, Default)]
pub struct RequestListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
    /// Optional status filter (PENDING, APPROVED, REJECTED)
    pub status: Option<String>,
    /// Optional direction filter (SUPPLY_IN, SUPPLY_OUT)
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SummaryQuery {
    /// Optional direction filter (SUPPLY_IN, SUPPLY_OUT)
    pub kind: Option<String>,
}

fn parse_status(value: &str) -> Result<RequestStatus, ServiceError> {
    match value.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(RequestStatus::Pending),
        "APPROVED" => Ok(RequestStatus::Approved),
        "REJECTED" => Ok(RequestStatus::Rejected),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown request status '{}'",
            other
        ))),
    }
}

fn parse_kind(value: &str) -> Result<RequestKind, ServiceError> {
    match value.to_ascii_uppercase().as_str() {
        "SUPPLY_IN" => Ok(RequestKind::SupplyIn),
        "SUPPLY_OUT" => Ok(RequestKind::SupplyOut),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown request kind '{}'",
            other
        ))),
    }
}

fn filter_from_query(query: &RequestListQuery) -> Result<RequestFilter, ServiceError> {
    Ok(RequestFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        kind: query.kind.as_deref().map(parse_kind).transpose()?,
    })
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> ApiResult<PaginatedResponse<RequestWithItems>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let filter = filter_from_query(&query)?;

    let (rows, total) = state
        .services
        .requests
        .list_requests(filter, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        rows, total, page, limit,
    ))))
}

pub async fn request_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Vec<RequestSummaryRow>> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let rows = state.services.requests.summarize_approved(kind).await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RequestWithItems> {
    match state.services.requests.get_request(id).await? {
        Some(row) => Ok(Json(ApiResponse::success(row))),
        None => Err(ServiceError::NotFound(format!("Request {} not found", id))),
    }
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateRequestInput>,
) -> ApiResult<RequestWithItems> {
    let created = state.services.requests.create_request(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DecisionOutcome> {
    let outcome = state
        .services
        .requests
        .decide(id, Decision::Approve, &user)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DecisionOutcome> {
    let outcome = state
        .services
        .requests
        .decide(id, Decision::Reject, &user)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn receive_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceiptOutcome> {
    let outcome = state.services.requests.mark_received(id, &user).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn export_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> Result<Response, ServiceError> {
    let filter = filter_from_query(&query)?;

    // The export walks every matching page rather than trusting one fetch.
    let mut rows: Vec<RequestWithItems> = Vec::new();
    let mut page = 1;
    loop {
        let (mut batch, total) = state
            .services
            .requests
            .list_requests(
                RequestFilter {
                    status: filter.status,
                    kind: filter.kind,
                },
                page,
                100,
            )
            .await?;
        let fetched = batch.len() as u64;
        rows.append(&mut batch);
        if rows.len() as u64 >= total || fetched == 0 {
            break;
        }
        page += 1;
    }

    let ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|r| r.items.iter().map(|line| line.item_id))
        .collect();
    let names: HashMap<Uuid, String> = item::Entity::find()
        .filter(item::Column::Id.is_in(ids))
        .all(&*state.db)
        .await
        .map_err(ServiceError::DatabaseError)?
        .into_iter()
        .map(|i| (i.id, i.name))
        .collect();

    let body = reports::requests_to_csv(&rows, &names)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"requests.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
