//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{InventoryItemRecord, PriceHistoryRecord, PriceRecord};
use crate::domain::types::ChangeType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub cost_price: f64,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub is_active: bool,
    pub is_trackable: bool,
}

/// Partial update: only `Some` fields reach the SET clause.
/// `available_quantity` is filled in by the service when the patch touches
/// stock or reserved quantities.
#[derive(Debug, Clone, Default)]
pub struct InventoryItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub stock_quantity: Option<i32>,
    pub reserved_quantity: Option<i32>,
    pub available_quantity: Option<i32>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub cost_price: Option<f64>,
    pub min_stock_level: Option<i32>,
    pub max_stock_level: Option<i32>,
    pub is_active: Option<bool>,
    pub is_trackable: Option<bool>,
}

impl InventoryItemPatch {
    pub fn touches_stock(&self) -> bool {
        self.stock_quantity.is_some() || self.reserved_quantity.is_some()
    }
}

#[async_trait]
pub trait InventoryRepo: Send + Sync {
    async fn list_items(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<InventoryItemRecord>, RepoError>;

    async fn find_item(&self, id: i64) -> Result<Option<InventoryItemRecord>, RepoError>;

    async fn sku_exists(&self, sku: &str) -> Result<bool, RepoError>;

    /// Insert a new item. A duplicate SKU surfaces as [`RepoError::Duplicate`]
    /// via the unique constraint; there is no check-then-act window.
    async fn insert_item(&self, item: NewInventoryItem)
    -> Result<InventoryItemRecord, RepoError>;

    /// Apply a partial update; `None` when the id does not exist.
    async fn update_item(
        &self,
        id: i64,
        patch: InventoryItemPatch,
    ) -> Result<Option<InventoryItemRecord>, RepoError>;

    /// Hard delete; false when the id does not exist.
    async fn delete_item(&self, id: i64) -> Result<bool, RepoError>;

    /// Active items with `available_quantity <= threshold`, ascending by
    /// available quantity.
    async fn list_below_available(
        &self,
        threshold: i32,
    ) -> Result<Vec<InventoryItemRecord>, RepoError>;

    /// Every active item, for the uncached stats scan.
    async fn list_active(&self) -> Result<Vec<InventoryItemRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewPrice {
    pub inventory_id: i64,
    pub selling_price: f64,
    pub cost_price: f64,
    pub discount_price: Option<f64>,
    pub currency: String,
    pub margin_percent: Option<f64>,
    pub markup_percent: Option<f64>,
    pub requires_approval: bool,
}

#[derive(Debug, Clone)]
pub struct NewPriceHistory {
    pub inventory_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub price_change_amount: f64,
    pub price_change_percent: f64,
    pub change_reason: Option<String>,
    pub changed_by: Option<String>,
    pub change_type: ChangeType,
    pub notes: Option<String>,
}

#[async_trait]
pub trait PriceRepo: Send + Sync {
    /// Active prices, most recent effective window first.
    async fn list_active_prices(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PriceRecord>, RepoError>;

    /// The current price: active, effective at `now`, latest effective_from
    /// wins with highest id as tie-break.
    async fn find_current_price(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<PriceRecord>, RepoError>;

    /// Atomically close the item's active price window (when one exists) and
    /// append `price` as the new current row, recording `history` in the same
    /// transaction. Exactly one active row per item holds after the call.
    async fn replace_current_price(
        &self,
        price: NewPrice,
        history: Option<NewPriceHistory>,
        now: OffsetDateTime,
    ) -> Result<PriceRecord, RepoError>;

    /// History rows for an item since `since`, newest first.
    async fn history_since(
        &self,
        item_id: i64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError>;

    /// History rows since `since` whose absolute change percent reaches
    /// `threshold_percent`, ordered by percent descending.
    async fn significant_since(
        &self,
        threshold_percent: f64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError>;
}
