use crate::{
    auth::{user, Role},
    errors::ServiceError,
    services::users::CreateUserInput,
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserSummary {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            active: model.active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserPayload {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 12, message = "Password must be at least 12 characters"))]
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRolePayload {
    pub role: String,
}

fn parse_role(value: &str) -> Result<Role, ServiceError> {
    Role::from_claim(value)
        .ok_or_else(|| ServiceError::ValidationError(format!("Unknown role '{}'", value)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<UserSummary>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (records, total) = state.services.users.list_users(page, limit).await?;
    let users: Vec<UserSummary> = records.into_iter().map(UserSummary::from).collect();

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        users, total, page, limit,
    ))))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> ApiResult<UserSummary> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let role = parse_role(&payload.role)?;

    let created = state
        .services
        .users
        .create_user(CreateUserInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role,
        })
        .await?;
    Ok(Json(ApiResponse::success(UserSummary::from(created))))
}

pub async fn change_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeRolePayload>,
) -> ApiResult<UserSummary> {
    let role = parse_role(&payload.role)?;
    let updated = state.services.users.change_role(id, role).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(updated))))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    let updated = state.services.users.deactivate_user(id).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(updated))))
}
