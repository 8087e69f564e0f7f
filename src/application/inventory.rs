//! Inventory service: CRUD, stock computation, low-stock alerting, and the
//! cache-aside protocol around all of it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{
    InventoryItemPatch, InventoryRepo, NewInventoryItem, RepoError,
};
use crate::cache::{CacheHandle, CacheKey, keys};
use crate::domain::entities::InventoryItemRecord;
use crate::domain::stock;
use crate::domain::types::{StockAlertLevel, UpdateAction};
use crate::realtime::{ConnectionManager, InventoryUpdate, StockAlert};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Create request. Defaults mirror the storage schema so sparse clients get
/// sensible rows.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInventoryItem {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub reserved_quantity: i32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub cost_price: f64,
    #[serde(default = "default_min_stock_level")]
    pub min_stock_level: i32,
    #[serde(default = "default_max_stock_level")]
    pub max_stock_level: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_trackable: bool,
}

fn default_min_stock_level() -> i32 {
    10
}

fn default_max_stock_level() -> i32 {
    1000
}

fn default_true() -> bool {
    true
}

/// Partial update request; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInventoryItem {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub stock_quantity: Option<i32>,
    pub reserved_quantity: Option<i32>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub cost_price: Option<f64>,
    pub min_stock_level: Option<i32>,
    pub max_stock_level: Option<i32>,
    pub is_active: Option<bool>,
    pub is_trackable: Option<bool>,
}

/// Normalized low-stock view served by the alert rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
    pub shortage_amount: i32,
    pub alert_level: StockAlertLevel,
}

/// Aggregate snapshot over active items. Uncached and O(n); meant for
/// periodic batch consumers, not per-request dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub out_of_stock_count: usize,
    pub low_stock_count: usize,
    pub normal_stock_count: usize,
    pub total_value: f64,
    pub normal_stock_percentage: f64,
    pub low_stock_percentage: f64,
    pub out_of_stock_percentage: f64,
}

#[derive(Clone)]
pub struct InventoryService {
    repo: Arc<dyn InventoryRepo>,
    cache: CacheHandle,
    realtime: Arc<ConnectionManager>,
    low_stock_threshold: i32,
}

impl InventoryService {
    pub fn new(
        repo: Arc<dyn InventoryRepo>,
        cache: CacheHandle,
        realtime: Arc<ConnectionManager>,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            repo,
            cache,
            realtime,
            low_stock_threshold,
        }
    }

    /// Cache-aside page read. Hit and miss paths both return typed records;
    /// the cached form is the JSON of the same records a live query yields.
    pub async fn list(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<InventoryItemRecord>, InventoryError> {
        let key = CacheKey::InventoryList { skip, limit };
        if let Some(cached) = self.cache.get_json::<Vec<InventoryItemRecord>>(&key).await {
            debug!(skip, limit, "inventory list served from cache");
            return Ok(cached);
        }

        let items = self.repo.list_items(skip, limit).await?;
        self.cache.put_json(&key, &items).await;
        info!(count = items.len(), "inventory list served from database");
        Ok(items)
    }

    /// Cache-aside single-entity read.
    pub async fn get(&self, id: i64) -> Result<Option<InventoryItemRecord>, InventoryError> {
        let key = CacheKey::InventoryItem(id);
        if let Some(cached) = self.cache.get_json::<InventoryItemRecord>(&key).await {
            debug!(item_id = id, "inventory item served from cache");
            return Ok(Some(cached));
        }

        let item = self.repo.find_item(id).await?;
        if let Some(item) = &item {
            self.cache.put_json(&key, item).await;
        }
        Ok(item)
    }

    pub async fn sku_exists(&self, sku: &str) -> Result<bool, InventoryError> {
        Ok(self.repo.sku_exists(sku).await?)
    }

    /// Create an item, computing its available quantity. A duplicate SKU
    /// comes back as `RepoError::Duplicate` straight from the constraint.
    pub async fn create(
        &self,
        input: CreateInventoryItem,
    ) -> Result<InventoryItemRecord, InventoryError> {
        let available_quantity =
            stock::available_quantity(input.stock_quantity, input.reserved_quantity);
        let item = self
            .repo
            .insert_item(NewInventoryItem {
                sku: input.sku,
                name: input.name,
                description: input.description,
                category: input.category,
                stock_quantity: input.stock_quantity,
                reserved_quantity: input.reserved_quantity,
                available_quantity,
                weight: input.weight,
                dimensions: input.dimensions,
                cost_price: input.cost_price,
                min_stock_level: input.min_stock_level,
                max_stock_level: input.max_stock_level,
                is_active: input.is_active,
                is_trackable: input.is_trackable,
            })
            .await?;

        self.invalidate(Some(item.id)).await;
        self.realtime
            .send_inventory_update(InventoryUpdate {
                action: UpdateAction::Created,
                item: (&item).into(),
            })
            .await;

        info!(item_id = item.id, sku = %item.sku, "created inventory item");
        Ok(item)
    }

    /// Partial update. Available quantity is recomputed only when the patch
    /// touches stock or reserved quantities; a resulting low-stock state
    /// emits a stock alert. `None` when the id does not exist.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateInventoryItem,
    ) -> Result<Option<InventoryItemRecord>, InventoryError> {
        let Some(existing) = self.repo.find_item(id).await? else {
            return Ok(None);
        };

        let mut patch = InventoryItemPatch {
            sku: input.sku,
            name: input.name,
            description: input.description,
            category: input.category,
            stock_quantity: input.stock_quantity,
            reserved_quantity: input.reserved_quantity,
            available_quantity: None,
            weight: input.weight,
            dimensions: input.dimensions,
            cost_price: input.cost_price,
            min_stock_level: input.min_stock_level,
            max_stock_level: input.max_stock_level,
            is_active: input.is_active,
            is_trackable: input.is_trackable,
        };
        if patch.touches_stock() {
            let new_stock = patch.stock_quantity.unwrap_or(existing.stock_quantity);
            let new_reserved = patch
                .reserved_quantity
                .unwrap_or(existing.reserved_quantity);
            patch.available_quantity = Some(stock::available_quantity(new_stock, new_reserved));
        }

        let Some(updated) = self.repo.update_item(id, patch).await? else {
            return Ok(None);
        };

        self.invalidate(Some(id)).await;

        if updated.is_low_stock() {
            self.realtime
                .send_stock_alert(StockAlert::for_item(&updated))
                .await;
        }
        self.realtime
            .send_inventory_update(InventoryUpdate {
                action: UpdateAction::Updated,
                item: (&updated).into(),
            })
            .await;

        info!(item_id = id, sku = %updated.sku, "updated inventory item");
        Ok(Some(updated))
    }

    /// Hard delete; false when the id does not exist.
    pub async fn delete(&self, id: i64) -> Result<bool, InventoryError> {
        let Some(existing) = self.repo.find_item(id).await? else {
            return Ok(false);
        };

        self.repo.delete_item(id).await?;
        self.invalidate(Some(id)).await;
        self.realtime
            .send_inventory_update(InventoryUpdate {
                action: UpdateAction::Deleted,
                item: (&existing).into(),
            })
            .await;

        info!(item_id = id, sku = %existing.sku, "deleted inventory item");
        Ok(true)
    }

    /// Cache-aside low-stock rollup for active items at or below `threshold`
    /// available units (the configured default when absent).
    pub async fn low_stock_alerts(
        &self,
        threshold: Option<i32>,
    ) -> Result<Vec<LowStockAlert>, InventoryError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let key = CacheKey::LowStock { threshold };
        if let Some(cached) = self.cache.get_json::<Vec<LowStockAlert>>(&key).await {
            debug!(threshold, "low stock rollup served from cache");
            return Ok(cached);
        }

        let items = self.repo.list_below_available(threshold).await?;
        let alerts: Vec<LowStockAlert> = items
            .iter()
            .map(|item| LowStockAlert {
                id: item.id,
                sku: item.sku.clone(),
                name: item.name.clone(),
                current_stock: item.available_quantity,
                min_stock_level: item.min_stock_level,
                shortage_amount: stock::shortage_amount(
                    item.available_quantity,
                    item.min_stock_level,
                ),
                alert_level: stock::alert_level(item.available_quantity, item.min_stock_level),
            })
            .collect();

        self.cache.put_json(&key, &alerts).await;
        info!(threshold, count = alerts.len(), "low stock rollup computed");
        Ok(alerts)
    }

    /// Full scan over active items; see [`InventoryStats`].
    pub async fn stats(&self) -> Result<InventoryStats, InventoryError> {
        let items = self.repo.list_active().await?;

        let total_items = items.len();
        let out_of_stock_count = items.iter().filter(|item| item.stock_quantity <= 0).count();
        let low_stock_count = items
            .iter()
            .filter(|item| item.stock_quantity > 0 && item.stock_quantity <= item.min_stock_level)
            .count();
        let normal_stock_count = total_items - out_of_stock_count - low_stock_count;
        let total_value = items
            .iter()
            .map(|item| f64::from(item.stock_quantity) * item.cost_price)
            .sum();

        let percentage = |count: usize| {
            if total_items == 0 {
                0.0
            } else {
                round_one_decimal(count as f64 / total_items as f64 * 100.0)
            }
        };

        Ok(InventoryStats {
            total_items,
            out_of_stock_count,
            low_stock_count,
            normal_stock_count,
            total_value,
            normal_stock_percentage: percentage(normal_stock_count),
            low_stock_percentage: percentage(low_stock_count),
            out_of_stock_percentage: percentage(out_of_stock_count),
        })
    }

    async fn invalidate(&self, item_id: Option<i64>) {
        self.cache
            .forget_all(&keys::inventory_invalidation_set(item_id))
            .await;
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
