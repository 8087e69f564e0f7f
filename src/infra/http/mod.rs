//! HTTP surface: thin handlers over the services plus the WebSocket
//! endpoints. Error mapping to status codes lives here so the services stay
//! transport-free.

mod inventory;
mod prices;
mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::application::{
    inventory::{InventoryError, InventoryService},
    pricing::{PriceError, PriceService},
    repos::RepoError,
};
use crate::realtime::ConnectionManager;

#[derive(Clone)]
pub struct ApiState {
    pub inventory: InventoryService,
    pub prices: PriceService,
    pub manager: Arc<ConnectionManager>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/api/v1/inventory",
            get(inventory::list).post(inventory::create),
        )
        .route("/api/v1/inventory/low-stock/alert", get(inventory::low_stock))
        .route("/api/v1/inventory/stats", get(inventory::stats))
        .route(
            "/api/v1/inventory/{item_id}",
            get(inventory::get_item)
                .put(inventory::update)
                .delete(inventory::delete),
        )
        .route("/api/v1/price", get(prices::list).post(prices::create))
        .route(
            "/api/v1/price/changes/significant",
            get(prices::significant_changes),
        )
        .route(
            "/api/v1/price/{item_id}",
            get(prices::current).put(prices::update),
        )
        .route("/api/v1/price/{item_id}/history", get(prices::history))
        .route("/ws/inventory", get(ws::inventory))
        .route("/ws/price", get(ws::price))
        .route("/ws/alerts", get(ws::alerts))
        .route("/ws/stats", get(ws::stats))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "scorta inventory & pricing API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "scorta" }))
}

/// Pagination window shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Error envelope for API consumers: `{"detail": "..."}` with a matching
/// status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let (status, detail) = match err {
            RepoError::Duplicate { constraint } => (
                StatusCode::CONFLICT,
                format!("duplicate record violates unique constraint `{constraint}`"),
            ),
            RepoError::NotFound => (StatusCode::NOT_FOUND, "resource not found".to_string()),
            RepoError::InvalidInput { message } => (StatusCode::BAD_REQUEST, message),
            RepoError::Integrity { message } => (StatusCode::CONFLICT, message),
            RepoError::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "database timeout".to_string(),
            ),
            RepoError::Persistence(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        Self { status, detail }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Repo(repo) => repo.into(),
        }
    }
}

impl From<PriceError> for ApiError {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::Repo(repo) => repo.into(),
        }
    }
}
