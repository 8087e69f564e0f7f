//! Domain entities mirrored from persistent storage.
//!
//! Records serialize to the same JSON shape whether they come from a live
//! query or out of the cache, so both read paths share one contract.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{
    pricing, stock,
    types::{ChangeSignificance, StockStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItemRecord {
    pub id: i64,
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
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl InventoryItemRecord {
    pub fn is_low_stock(&self) -> bool {
        stock::is_low_stock(self.available_quantity, self.min_stock_level)
    }

    pub fn stock_status(&self) -> StockStatus {
        stock::stock_status(self.available_quantity, self.min_stock_level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: i64,
    pub inventory_id: i64,
    pub selling_price: f64,
    pub cost_price: f64,
    pub discount_price: Option<f64>,
    pub currency: String,
    pub margin_percent: Option<f64>,
    pub markup_percent: Option<f64>,
    pub is_active: bool,
    pub requires_approval: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub effective_from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub effective_until: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PriceRecord {
    /// The price a buyer pays: discount price when set, selling price otherwise.
    pub fn final_price(&self) -> f64 {
        pricing::final_price(self.selling_price, self.discount_price)
    }

    /// Profit margin as a percentage of the final price; 0 when cost is untracked.
    pub fn calculated_margin(&self) -> f64 {
        pricing::calculated_margin(self.selling_price, self.discount_price, self.cost_price)
    }
}

/// One immutable row per recorded price transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryRecord {
    pub id: i64,
    pub inventory_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub price_change_percent: f64,
    pub price_change_amount: f64,
    pub change_reason: Option<String>,
    pub changed_by: Option<String>,
    pub change_type: Option<String>,
    pub notes: Option<String>,
    pub external_reference: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
}

impl PriceHistoryRecord {
    pub fn is_price_increase(&self) -> bool {
        self.new_price > self.old_price
    }

    pub fn change_significance(&self) -> ChangeSignificance {
        pricing::change_significance(self.price_change_percent)
    }
}
