//! Price service: append-only current prices, transition history, and
//! significant-change alerting.
//!
//! Every price change — create or update — closes the prior active window
//! and appends a new row, so the `prices` table is a complete time-windowed
//! history of "current price" rows alongside the separate change log.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::application::repos::{
    InventoryRepo, NewPrice, NewPriceHistory, PriceRepo, RepoError,
};
use crate::cache::{CacheHandle, CacheKey, keys};
use crate::domain::entities::{PriceHistoryRecord, PriceRecord};
use crate::domain::pricing;
use crate::domain::types::{ChangeType, UpdateAction};
use crate::realtime::{ConnectionManager, PriceChangeAlert, PriceUpdate};

#[derive(Debug, Error)]
pub enum PriceError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrice {
    pub inventory_id: i64,
    pub selling_price: f64,
    pub cost_price: f64,
    #[serde(default)]
    pub discount_price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub margin_percent: Option<f64>,
    #[serde(default)]
    pub markup_percent: Option<f64>,
    #[serde(default)]
    pub requires_approval: bool,
}

fn default_currency() -> String {
    "JPY".to_string()
}

/// Partial update request; absent fields carry over from the current price.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrice {
    pub selling_price: Option<f64>,
    pub cost_price: Option<f64>,
    pub discount_price: Option<f64>,
    pub currency: Option<String>,
    pub margin_percent: Option<f64>,
    pub markup_percent: Option<f64>,
    pub requires_approval: Option<bool>,
    pub change_reason: Option<String>,
}

#[derive(Clone)]
pub struct PriceService {
    prices: Arc<dyn PriceRepo>,
    inventory: Arc<dyn InventoryRepo>,
    cache: CacheHandle,
    realtime: Arc<ConnectionManager>,
    /// Fraction of the old price at which a change becomes alert-worthy.
    change_threshold: f64,
}

impl PriceService {
    pub fn new(
        prices: Arc<dyn PriceRepo>,
        inventory: Arc<dyn InventoryRepo>,
        cache: CacheHandle,
        realtime: Arc<ConnectionManager>,
        change_threshold: f64,
    ) -> Self {
        Self {
            prices,
            inventory,
            cache,
            realtime,
            change_threshold,
        }
    }

    /// Active prices, most recent effective window first. Uncached.
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<PriceRecord>, PriceError> {
        let prices = self.prices.list_active_prices(skip, limit).await?;
        info!(count = prices.len(), "price list served from database");
        Ok(prices)
    }

    /// Cache-aside read of an item's current price.
    pub async fn current_price(&self, item_id: i64) -> Result<Option<PriceRecord>, PriceError> {
        let key = CacheKey::CurrentPrice(item_id);
        if let Some(cached) = self.cache.get_json::<PriceRecord>(&key).await {
            debug!(item_id, "current price served from cache");
            return Ok(Some(cached));
        }

        let price = self
            .prices
            .find_current_price(item_id, OffsetDateTime::now_utc())
            .await?;
        if let Some(price) = &price {
            self.cache.put_json(&key, price).await;
        }
        Ok(price)
    }

    /// Set a new current price, recording the transition when a prior price
    /// existed and alerting when it moved past the configured threshold.
    pub async fn create_or_update(&self, input: CreatePrice) -> Result<PriceRecord, PriceError> {
        let now = OffsetDateTime::now_utc();
        let existing = self
            .prices
            .find_current_price(input.inventory_id, now)
            .await?;

        let history = existing.as_ref().map(|prior| {
            history_entry(
                input.inventory_id,
                prior.selling_price,
                input.selling_price,
                Some("manual_update".to_string()),
            )
        });

        let created = self
            .prices
            .replace_current_price(
                NewPrice {
                    inventory_id: input.inventory_id,
                    selling_price: input.selling_price,
                    cost_price: input.cost_price,
                    discount_price: input.discount_price,
                    currency: input.currency,
                    margin_percent: input.margin_percent,
                    markup_percent: input.markup_percent,
                    requires_approval: input.requires_approval,
                },
                history,
                now,
            )
            .await?;

        if let Some(prior) = &existing {
            self.maybe_alert(prior.selling_price, &created, now).await;
        }

        self.invalidate(created.inventory_id).await;
        let action = if existing.is_some() {
            UpdateAction::Updated
        } else {
            UpdateAction::Created
        };
        self.realtime
            .send_price_update(PriceUpdate {
                action,
                price: (&created).into(),
            })
            .await;

        info!(
            item_id = created.inventory_id,
            new_price = created.selling_price,
            "price set"
        );
        Ok(created)
    }

    /// Patch the current price. Follows the same append model as
    /// [`Self::create_or_update`]: the merged row becomes a new current
    /// price and the prior window is closed. `None` when the item has no
    /// current price.
    pub async fn update(
        &self,
        item_id: i64,
        input: UpdatePrice,
    ) -> Result<Option<PriceRecord>, PriceError> {
        let now = OffsetDateTime::now_utc();
        let Some(current) = self.prices.find_current_price(item_id, now).await? else {
            return Ok(None);
        };

        let old_price = current.selling_price;
        let selling_changed = input.selling_price.is_some();
        let merged = NewPrice {
            inventory_id: item_id,
            selling_price: input.selling_price.unwrap_or(current.selling_price),
            cost_price: input.cost_price.unwrap_or(current.cost_price),
            discount_price: input.discount_price.or(current.discount_price),
            currency: input.currency.unwrap_or_else(|| current.currency.clone()),
            margin_percent: input.margin_percent.or(current.margin_percent),
            markup_percent: input.markup_percent.or(current.markup_percent),
            requires_approval: input
                .requires_approval
                .unwrap_or(current.requires_approval),
        };

        let history = selling_changed.then(|| {
            history_entry(
                item_id,
                old_price,
                merged.selling_price,
                input
                    .change_reason
                    .clone()
                    .or_else(|| Some("price_update".to_string())),
            )
        });

        let updated = self.prices.replace_current_price(merged, history, now).await?;

        if selling_changed {
            self.maybe_alert(old_price, &updated, now).await;
        }

        self.invalidate(item_id).await;
        self.realtime
            .send_price_update(PriceUpdate {
                action: UpdateAction::Updated,
                price: (&updated).into(),
            })
            .await;

        info!(item_id, new_price = updated.selling_price, "price updated");
        Ok(Some(updated))
    }

    /// Cache-aside read of an item's transition history over the last `days`.
    pub async fn history(
        &self,
        item_id: i64,
        days: i64,
    ) -> Result<Vec<PriceHistoryRecord>, PriceError> {
        let key = CacheKey::PriceHistory { item_id, days };
        if let Some(cached) = self.cache.get_json::<Vec<PriceHistoryRecord>>(&key).await {
            debug!(item_id, days, "price history served from cache");
            return Ok(cached);
        }

        let since = OffsetDateTime::now_utc() - Duration::days(days);
        let history = self.prices.history_since(item_id, since).await?;
        self.cache.put_json(&key, &history).await;
        info!(item_id, count = history.len(), "price history served from database");
        Ok(history)
    }

    /// Transitions over the last `hours` whose absolute percent reaches
    /// `threshold_percent`, largest first. Uncached scan.
    pub async fn significant_changes(
        &self,
        threshold_percent: f64,
        hours: i64,
    ) -> Result<Vec<PriceHistoryRecord>, PriceError> {
        let since = OffsetDateTime::now_utc() - Duration::hours(hours);
        let changes = self
            .prices
            .significant_since(threshold_percent, since)
            .await?;
        info!(
            threshold = threshold_percent,
            count = changes.len(),
            "significant price changes scanned"
        );
        Ok(changes)
    }

    /// Emit a price-change alert when the move reaches the configured
    /// threshold. Alert enrichment reads the inventory item for its SKU and
    /// name; a failed lookup falls back to a synthetic label rather than
    /// failing the mutation.
    async fn maybe_alert(&self, old_price: f64, new: &PriceRecord, now: OffsetDateTime) {
        if !pricing::is_significant_change(old_price, new.selling_price, self.change_threshold) {
            return;
        }

        let item = self
            .inventory
            .find_item(new.inventory_id)
            .await
            .ok()
            .flatten();
        let (sku, item_name) = match item {
            Some(item) => (item.sku, item.name),
            None => (format!("ITEM-{}", new.inventory_id), String::from("unknown")),
        };

        let change_percent = pricing::change_percent(old_price, new.selling_price).abs();
        self.realtime
            .send_price_alert(PriceChangeAlert {
                inventory_id: new.inventory_id,
                sku,
                item_name,
                old_price,
                new_price: new.selling_price,
                change_percent,
                change_amount: pricing::change_amount(old_price, new.selling_price),
                alert_type: pricing::alert_kind(old_price, new.selling_price),
                timestamp: now,
            })
            .await;
    }

    async fn invalidate(&self, item_id: i64) {
        self.cache
            .forget_all(&keys::price_invalidation_set(item_id))
            .await;
    }
}

fn history_entry(
    inventory_id: i64,
    old_price: f64,
    new_price: f64,
    change_reason: Option<String>,
) -> NewPriceHistory {
    NewPriceHistory {
        inventory_id,
        old_price,
        new_price,
        price_change_amount: pricing::change_amount(old_price, new_price),
        price_change_percent: pricing::change_percent(old_price, new_price),
        change_reason,
        changed_by: None,
        change_type: ChangeType::Manual,
        notes: None,
    }
}
