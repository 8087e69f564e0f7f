//! Shared fixtures: in-memory repositories wired to the real services,
//! cache, and connection manager.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use scorta::application::inventory::{CreateInventoryItem, InventoryService};
use scorta::application::pricing::PriceService;
use scorta::application::repos::{
    InventoryItemPatch, InventoryRepo, NewInventoryItem, NewPrice, NewPriceHistory, PriceRepo,
    RepoError,
};
use scorta::cache::{CacheHandle, MemoryCache};
use scorta::domain::entities::{InventoryItemRecord, PriceHistoryRecord, PriceRecord};
use scorta::realtime::{ConnectionManager, StreamKind};

pub const LOW_STOCK_THRESHOLD: i32 = 10;
pub const PRICE_CHANGE_THRESHOLD: f64 = 0.05;

#[derive(Default)]
pub struct MemoryInventoryRepo {
    items: Mutex<Vec<InventoryItemRecord>>,
    next_id: AtomicI64,
}

impl MemoryInventoryRepo {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn snapshot(&self) -> Vec<InventoryItemRecord> {
        self.items.lock().unwrap().clone()
    }

    /// Overwrite a stored row directly, bypassing the service layer.
    pub fn put_raw(&self, record: InventoryItemRecord) {
        let mut items = self.items.lock().unwrap();
        if let Some(existing) = items.iter_mut().find(|item| item.id == record.id) {
            *existing = record;
        } else {
            items.push(record);
        }
    }
}

#[async_trait]
impl InventoryRepo for MemoryInventoryRepo {
    async fn list_items(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<InventoryItemRecord>, RepoError> {
        let mut items = self.items.lock().unwrap().clone();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(items
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_item(&self, id: i64) -> Result<Option<InventoryItemRecord>, RepoError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id == id)
            .cloned())
    }

    async fn sku_exists(&self, sku: &str) -> Result<bool, RepoError> {
        Ok(self.items.lock().unwrap().iter().any(|item| item.sku == sku))
    }

    async fn insert_item(
        &self,
        item: NewInventoryItem,
    ) -> Result<InventoryItemRecord, RepoError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|existing| existing.sku == item.sku) {
            return Err(RepoError::Duplicate {
                constraint: "inventory_sku_key".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = InventoryItemRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            sku: item.sku,
            name: item.name,
            description: item.description,
            category: item.category,
            stock_quantity: item.stock_quantity,
            reserved_quantity: item.reserved_quantity,
            available_quantity: item.available_quantity,
            weight: item.weight,
            dimensions: item.dimensions,
            cost_price: item.cost_price,
            min_stock_level: item.min_stock_level,
            max_stock_level: item.max_stock_level,
            is_active: item.is_active,
            is_trackable: item.is_trackable,
            created_at: now,
            updated_at: now,
        };
        items.push(record.clone());
        Ok(record)
    }

    async fn update_item(
        &self,
        id: i64,
        patch: InventoryItemPatch,
    ) -> Result<Option<InventoryItemRecord>, RepoError> {
        let mut items = self.items.lock().unwrap();

        if let Some(sku) = patch.sku.as_ref()
            && items
                .iter()
                .any(|item| item.id != id && &item.sku == sku)
        {
            return Err(RepoError::Duplicate {
                constraint: "inventory_sku_key".to_string(),
            });
        }

        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return Ok(None);
        };

        if let Some(sku) = patch.sku {
            item.sku = sku;
        }
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(description) = patch.description {
            item.description = Some(description);
        }
        if let Some(category) = patch.category {
            item.category = Some(category);
        }
        if let Some(stock_quantity) = patch.stock_quantity {
            item.stock_quantity = stock_quantity;
        }
        if let Some(reserved_quantity) = patch.reserved_quantity {
            item.reserved_quantity = reserved_quantity;
        }
        if let Some(available_quantity) = patch.available_quantity {
            item.available_quantity = available_quantity;
        }
        if let Some(weight) = patch.weight {
            item.weight = Some(weight);
        }
        if let Some(dimensions) = patch.dimensions {
            item.dimensions = Some(dimensions);
        }
        if let Some(cost_price) = patch.cost_price {
            item.cost_price = cost_price;
        }
        if let Some(min_stock_level) = patch.min_stock_level {
            item.min_stock_level = min_stock_level;
        }
        if let Some(max_stock_level) = patch.max_stock_level {
            item.max_stock_level = max_stock_level;
        }
        if let Some(is_active) = patch.is_active {
            item.is_active = is_active;
        }
        if let Some(is_trackable) = patch.is_trackable {
            item.is_trackable = is_trackable;
        }
        item.updated_at = OffsetDateTime::now_utc();

        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: i64) -> Result<bool, RepoError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() < before)
    }

    async fn list_below_available(
        &self,
        threshold: i32,
    ) -> Result<Vec<InventoryItemRecord>, RepoError> {
        let mut items: Vec<_> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.is_active && item.available_quantity <= threshold)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.available_quantity);
        Ok(items)
    }

    async fn list_active(&self) -> Result<Vec<InventoryItemRecord>, RepoError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.is_active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryPriceRepo {
    prices: Mutex<Vec<PriceRecord>>,
    history: Mutex<Vec<PriceHistoryRecord>>,
    next_price_id: AtomicI64,
    next_history_id: AtomicI64,
}

impl MemoryPriceRepo {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            next_price_id: AtomicI64::new(1),
            next_history_id: AtomicI64::new(1),
        }
    }

    pub fn price_rows(&self) -> Vec<PriceRecord> {
        self.prices.lock().unwrap().clone()
    }

    pub fn history_rows(&self) -> Vec<PriceHistoryRecord> {
        self.history.lock().unwrap().clone()
    }

    /// Seed a price row directly, bypassing the service layer.
    pub fn put_raw_price(&self, record: PriceRecord) {
        self.prices.lock().unwrap().push(record);
    }

    /// Seed a history row directly, bypassing the service layer.
    pub fn put_raw_history(&self, record: PriceHistoryRecord) {
        self.history.lock().unwrap().push(record);
    }

    pub fn next_price_id(&self) -> i64 {
        self.next_price_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl PriceRepo for MemoryPriceRepo {
    async fn list_active_prices(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PriceRecord>, RepoError> {
        let mut prices: Vec<_> = self
            .prices
            .lock()
            .unwrap()
            .iter()
            .filter(|price| price.is_active)
            .cloned()
            .collect();
        prices.sort_by(|a, b| (b.effective_from, b.id).cmp(&(a.effective_from, a.id)));
        Ok(prices
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_current_price(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<PriceRecord>, RepoError> {
        Ok(self
            .prices
            .lock()
            .unwrap()
            .iter()
            .filter(|price| {
                price.inventory_id == item_id && price.is_active && price.effective_from <= now
            })
            .max_by_key(|price| (price.effective_from, price.id))
            .cloned())
    }

    async fn replace_current_price(
        &self,
        price: NewPrice,
        history: Option<NewPriceHistory>,
        now: OffsetDateTime,
    ) -> Result<PriceRecord, RepoError> {
        let mut prices = self.prices.lock().unwrap();
        for existing in prices
            .iter_mut()
            .filter(|row| row.inventory_id == price.inventory_id && row.is_active)
        {
            existing.is_active = false;
            existing.effective_until = Some(now);
            existing.updated_at = now;
        }

        let record = PriceRecord {
            id: self.next_price_id.fetch_add(1, Ordering::Relaxed),
            inventory_id: price.inventory_id,
            selling_price: price.selling_price,
            cost_price: price.cost_price,
            discount_price: price.discount_price,
            currency: price.currency,
            margin_percent: price.margin_percent,
            markup_percent: price.markup_percent,
            is_active: true,
            requires_approval: price.requires_approval,
            effective_from: now,
            effective_until: None,
            created_at: now,
            updated_at: now,
        };
        prices.push(record.clone());

        if let Some(entry) = history {
            self.history.lock().unwrap().push(PriceHistoryRecord {
                id: self.next_history_id.fetch_add(1, Ordering::Relaxed),
                inventory_id: entry.inventory_id,
                old_price: entry.old_price,
                new_price: entry.new_price,
                price_change_percent: entry.price_change_percent,
                price_change_amount: entry.price_change_amount,
                change_reason: entry.change_reason,
                changed_by: entry.changed_by,
                change_type: Some(entry.change_type.as_str().to_string()),
                notes: entry.notes,
                external_reference: None,
                changed_at: now,
            });
        }

        Ok(record)
    }

    async fn history_since(
        &self,
        item_id: i64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError> {
        let mut rows: Vec<_> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.inventory_id == item_id && entry.changed_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(rows)
    }

    async fn significant_since(
        &self,
        threshold_percent: f64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError> {
        let mut rows: Vec<_> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| {
                entry.changed_at >= since
                    && entry.price_change_percent.abs() >= threshold_percent
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.price_change_percent
                .partial_cmp(&a.price_change_percent)
                .expect("finite percents")
        });
        Ok(rows)
    }
}

pub struct Harness {
    pub backend: MemoryCache,
    pub cache: CacheHandle,
    pub manager: Arc<ConnectionManager>,
    pub inventory_repo: Arc<MemoryInventoryRepo>,
    pub price_repo: Arc<MemoryPriceRepo>,
    pub inventory: InventoryService,
    pub prices: PriceService,
}

pub fn harness() -> Harness {
    let backend = MemoryCache::new();
    let cache = CacheHandle::new(Arc::new(backend.clone()));
    let manager = Arc::new(ConnectionManager::new(cache.clone()));
    let inventory_repo = Arc::new(MemoryInventoryRepo::new());
    let price_repo = Arc::new(MemoryPriceRepo::new());

    let inventory = InventoryService::new(
        inventory_repo.clone(),
        cache.clone(),
        manager.clone(),
        LOW_STOCK_THRESHOLD,
    );
    let prices = PriceService::new(
        price_repo.clone(),
        inventory_repo.clone(),
        cache.clone(),
        manager.clone(),
        PRICE_CHANGE_THRESHOLD,
    );

    Harness {
        backend,
        cache,
        manager,
        inventory_repo,
        price_repo,
        inventory,
        prices,
    }
}

/// Register a probe client on `kind` and return its receiving end.
pub async fn probe(
    manager: &ConnectionManager,
    kind: StreamKind,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.register(kind, tx).await;
    rx
}

pub fn item_input(sku: &str, stock: i32, reserved: i32) -> CreateInventoryItem {
    serde_json::from_value(serde_json::json!({
        "sku": sku,
        "name": format!("Item {sku}"),
        "category": "Electronics",
        "stock_quantity": stock,
        "reserved_quantity": reserved,
        "cost_price": 8000.0,
        "min_stock_level": 10,
        "max_stock_level": 200,
    }))
    .expect("valid create payload")
}
