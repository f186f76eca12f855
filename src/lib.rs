//! HRDO Supply Hub API Library
//!
//! This crate provides the core functionality for the Supply Hub API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, routing::post, routing::put, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Versioned API routes
pub fn api_v1_routes() -> Router<AppState> {
    // Items routes with permission gating
    let items_read = Router::new()
        .route("/items", get(handlers::items::list_items))
        .route("/items/:id", get(handlers::items::get_item))
        .with_permission(perm::ITEMS_READ);

    let items_manage = Router::new()
        .route("/items", post(handlers::items::create_item))
        .route("/items/:id", put(handlers::items::update_item))
        .route("/items/:id/archive", post(handlers::items::archive_item))
        .with_permission(perm::ITEMS_MANAGE);

    let items_export = Router::new()
        .route("/items/export", get(handlers::items::export_items))
        .with_permission(perm::REPORTS_EXPORT);

    // Supply request routes with permission gating
    let requests_read = Router::new()
        .route("/requests", get(handlers::requests::list_requests))
        .route(
            "/requests/summary",
            get(handlers::requests::request_summary),
        )
        .route("/requests/:id", get(handlers::requests::get_request))
        .with_permission(perm::REQUESTS_READ);

    let requests_create = Router::new()
        .route("/requests", post(handlers::requests::create_request))
        .with_permission(perm::REQUESTS_CREATE);

    let requests_decide = Router::new()
        .route(
            "/requests/:id/approve",
            post(handlers::requests::approve_request),
        )
        .route(
            "/requests/:id/reject",
            post(handlers::requests::reject_request),
        )
        .with_permission(perm::REQUESTS_APPROVE);

    let requests_receive = Router::new()
        .route(
            "/requests/:id/receive",
            post(handlers::requests::receive_request),
        )
        .with_permission(perm::REQUESTS_RECEIVE);

    let requests_export = Router::new()
        .route("/requests/export", get(handlers::requests::export_requests))
        .with_permission(perm::REPORTS_EXPORT);

    // Memorandum routes with permission gating
    let memos_read = Router::new()
        .route("/memorandums", get(handlers::memorandums::list_memorandums))
        .route(
            "/memorandums/:id",
            get(handlers::memorandums::get_memorandum),
        )
        .with_permission(perm::MEMOS_READ);

    let memos_manage = Router::new()
        .route(
            "/memorandums",
            post(handlers::memorandums::create_memorandum),
        )
        .route(
            "/memorandums/:id",
            put(handlers::memorandums::update_memorandum)
                .delete(handlers::memorandums::delete_memorandum),
        )
        .with_permission(perm::MEMOS_MANAGE);

    // File uploads
    let uploads = Router::new()
        .route("/uploads", post(handlers::uploads::upload_file))
        .with_permission(perm::UPLOADS_CREATE);

    // User administration
    let users_manage = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/users/:id/role", put(handlers::users::change_role))
        .route(
            "/users/:id/deactivate",
            post(handlers::users::deactivate_user),
        )
        .with_permission(perm::USERS_MANAGE);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Items API (auth + permissions)
        .merge(items_read)
        .merge(items_manage)
        .merge(items_export)
        // Supply requests API (auth + permissions)
        .merge(requests_read)
        .merge(requests_create)
        .merge(requests_decide)
        .merge(requests_receive)
        .merge(requests_export)
        // Memorandums API (auth + permissions)
        .merge(memos_read)
        .merge(memos_manage)
        // Uploads
        .merge(uploads)
        // User administration
        .merge(users_manage)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "supply-hub-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn paginated_response_computes_total_pages() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}
