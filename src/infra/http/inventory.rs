use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::inventory::{
    CreateInventoryItem, InventoryStats, LowStockAlert, UpdateInventoryItem,
};
use crate::domain::entities::InventoryItemRecord;
use crate::domain::types::StockStatus;

use super::{ApiError, ApiState, Pagination};

/// Item response: the stored record plus its derived stock view.
#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    #[serde(flatten)]
    item: InventoryItemRecord,
    is_low_stock: bool,
    stock_status: StockStatus,
}

impl From<InventoryItemRecord> for InventoryResponse {
    fn from(item: InventoryItemRecord) -> Self {
        let is_low_stock = item.is_low_stock();
        let stock_status = item.stock_status();
        Self {
            item,
            is_low_stock,
            stock_status,
        }
    }
}

pub(super) async fn list(
    State(state): State<ApiState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<InventoryResponse>>, ApiError> {
    let items = state.inventory.list(page.skip, page.limit).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

pub(super) async fn get_item(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
) -> Result<Json<InventoryResponse>, ApiError> {
    state
        .inventory
        .get(item_id)
        .await?
        .map(|item| Json(item.into()))
        .ok_or_else(|| ApiError::not_found("Inventory item not found"))
}

pub(super) async fn create(
    State(state): State<ApiState>,
    Json(input): Json<CreateInventoryItem>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let item = state.inventory.create(input).await?;
    Ok(Json(item.into()))
}

pub(super) async fn update(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Json(input): Json<UpdateInventoryItem>,
) -> Result<Json<InventoryResponse>, ApiError> {
    state
        .inventory
        .update(item_id, input)
        .await?
        .map(|item| Json(item.into()))
        .ok_or_else(|| ApiError::not_found("Inventory item not found"))
}

pub(super) async fn delete(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.inventory.delete(item_id).await? {
        Ok(Json(json!({ "message": "Inventory item deleted" })))
    } else {
        Err(ApiError::not_found("Inventory item not found"))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LowStockQuery {
    threshold: Option<i32>,
}

pub(super) async fn low_stock(
    State(state): State<ApiState>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<LowStockAlert>>, ApiError> {
    let alerts = state.inventory.low_stock_alerts(query.threshold).await?;
    Ok(Json(alerts))
}

pub(super) async fn stats(
    State(state): State<ApiState>,
) -> Result<Json<InventoryStats>, ApiError> {
    let stats = state.inventory.stats().await?;
    Ok(Json(stats))
}
