use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::application::pricing::{CreatePrice, UpdatePrice};
use crate::domain::entities::{PriceHistoryRecord, PriceRecord};
use crate::domain::types::ChangeSignificance;

use super::{ApiError, ApiState, Pagination};

/// Price response: the stored row plus its derived pricing view.
#[derive(Debug, Serialize)]
pub struct PriceResponse {
    #[serde(flatten)]
    price: PriceRecord,
    final_price: f64,
    calculated_margin: f64,
}

impl From<PriceRecord> for PriceResponse {
    fn from(price: PriceRecord) -> Self {
        let final_price = price.final_price();
        let calculated_margin = price.calculated_margin();
        Self {
            price,
            final_price,
            calculated_margin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PriceHistoryResponse {
    #[serde(flatten)]
    entry: PriceHistoryRecord,
    is_price_increase: bool,
    change_significance: ChangeSignificance,
}

impl From<PriceHistoryRecord> for PriceHistoryResponse {
    fn from(entry: PriceHistoryRecord) -> Self {
        let is_price_increase = entry.is_price_increase();
        let change_significance = entry.change_significance();
        Self {
            entry,
            is_price_increase,
            change_significance,
        }
    }
}

pub(super) async fn list(
    State(state): State<ApiState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PriceResponse>>, ApiError> {
    let prices = state.prices.list(page.skip, page.limit).await?;
    Ok(Json(prices.into_iter().map(Into::into).collect()))
}

pub(super) async fn current(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
) -> Result<Json<PriceResponse>, ApiError> {
    state
        .prices
        .current_price(item_id)
        .await?
        .map(|price| Json(price.into()))
        .ok_or_else(|| ApiError::not_found("Price not found for this item"))
}

pub(super) async fn create(
    State(state): State<ApiState>,
    Json(input): Json<CreatePrice>,
) -> Result<Json<PriceResponse>, ApiError> {
    let price = state.prices.create_or_update(input).await?;
    Ok(Json(price.into()))
}

pub(super) async fn update(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Json(input): Json<UpdatePrice>,
) -> Result<Json<PriceResponse>, ApiError> {
    state
        .prices
        .update(item_id, input)
        .await?
        .map(|price| Json(price.into()))
        .ok_or_else(|| ApiError::not_found("Price not found for this item"))
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    #[serde(default = "default_history_days")]
    days: i64,
}

fn default_history_days() -> i64 {
    30
}

pub(super) async fn history(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PriceHistoryResponse>>, ApiError> {
    let history = state.prices.history(item_id, query.days).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub(super) struct SignificantChangesQuery {
    #[serde(default = "default_threshold_percent")]
    threshold_percent: f64,
    #[serde(default = "default_hours")]
    hours: i64,
}

fn default_threshold_percent() -> f64 {
    5.0
}

fn default_hours() -> i64 {
    24
}

pub(super) async fn significant_changes(
    State(state): State<ApiState>,
    Query(query): Query<SignificantChangesQuery>,
) -> Result<Json<Vec<PriceHistoryResponse>>, ApiError> {
    let changes = state
        .prices
        .significant_changes(query.threshold_percent, query.hours)
        .await?;
    Ok(Json(changes.into_iter().map(Into::into).collect()))
}
