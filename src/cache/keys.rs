//! Cache key and bus channel definitions.
//!
//! Key patterns (`namespace:noun:params`) and channel names are part of the
//! wire contract between service instances: other deployments compute the
//! same strings, so they must remain stable.

use std::time::Duration;

/// Bus channel carrying inventory CRUD events.
pub const CHANNEL_INVENTORY_UPDATES: &str = "inventory:updates";
/// Bus channel carrying price CRUD events.
pub const CHANNEL_PRICE_UPDATES: &str = "price:updates";
/// Bus channel carrying low-stock alerts.
pub const CHANNEL_STOCK_ALERTS: &str = "stock:alerts";
/// Bus channel carrying significant price-change alerts.
pub const CHANNEL_PRICE_ALERTS: &str = "price:alerts";
/// Bus channel for operator-facing notifications, fanned out to every group.
pub const CHANNEL_SYSTEM_NOTIFICATIONS: &str = "system:notifications";

/// Every channel the bus listener subscribes to.
pub const ALL_CHANNELS: [&str; 5] = [
    CHANNEL_INVENTORY_UPDATES,
    CHANNEL_PRICE_UPDATES,
    CHANNEL_STOCK_ALERTS,
    CHANNEL_PRICE_ALERTS,
    CHANNEL_SYSTEM_NOTIFICATIONS,
];

const TTL_ITEM: Duration = Duration::from_secs(600);
const TTL_LIST_PAGE: Duration = Duration::from_secs(300);
const TTL_ALERT_ROLLUP: Duration = Duration::from_secs(120);
const TTL_CURRENT_PRICE: Duration = Duration::from_secs(1800);
const TTL_HISTORY: Duration = Duration::from_secs(3600);

/// List pages covered by best-effort invalidation: the first ten windows of
/// the default page size. Pages beyond these expire by TTL.
const INVALIDATED_LIST_PAGES: i64 = 10;
const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Thresholds whose low-stock rollups are forgotten on every mutation.
const COMMON_LOW_STOCK_THRESHOLDS: [i32; 4] = [5, 10, 20, 50];

/// History windows (days) forgotten when an item's price changes.
const COMMON_HISTORY_WINDOWS: [i64; 3] = [7, 30, 90];

/// A cache entry address, rendered to its wire string on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    InventoryItem(i64),
    InventoryList { skip: i64, limit: i64 },
    CurrentPrice(i64),
    PriceHistory { item_id: i64, days: i64 },
    LowStock { threshold: i32 },
    PriceChanges { threshold: i32, hours: i64 },
}

impl CacheKey {
    /// Render the stable wire form of this key.
    pub fn render(&self) -> String {
        match self {
            Self::InventoryItem(id) => format!("inventory:item:{id}"),
            Self::InventoryList { skip, limit } => format!("inventory:list:{skip}:{limit}"),
            Self::CurrentPrice(item_id) => format!("price:current:{item_id}"),
            Self::PriceHistory { item_id, days } => format!("price:history:{item_id}:{days}"),
            Self::LowStock { threshold } => format!("alerts:low_stock:{threshold}"),
            Self::PriceChanges { threshold, hours } => {
                format!("alerts:price_changes:{threshold}:{hours}")
            }
        }
    }

    /// Time-to-live class for entries stored under this key.
    pub fn ttl(&self) -> Duration {
        match self {
            Self::InventoryItem(_) => TTL_ITEM,
            Self::InventoryList { .. } => TTL_LIST_PAGE,
            Self::CurrentPrice(_) => TTL_CURRENT_PRICE,
            Self::PriceHistory { .. } => TTL_HISTORY,
            Self::LowStock { .. } | Self::PriceChanges { .. } => TTL_ALERT_ROLLUP,
        }
    }
}

/// Keys to forget after an inventory mutation.
///
/// Best-effort enumeration, not pattern matching: the mutated item, the
/// first list windows, and the common alert thresholds. Anything outside
/// this set stays stale until its TTL runs out.
pub fn inventory_invalidation_set(item_id: Option<i64>) -> Vec<CacheKey> {
    let mut keys = Vec::new();
    if let Some(id) = item_id {
        keys.push(CacheKey::InventoryItem(id));
    }
    for page in 0..INVALIDATED_LIST_PAGES {
        keys.push(CacheKey::InventoryList {
            skip: page * DEFAULT_PAGE_LIMIT,
            limit: DEFAULT_PAGE_LIMIT,
        });
    }
    for threshold in COMMON_LOW_STOCK_THRESHOLDS {
        keys.push(CacheKey::LowStock { threshold });
    }
    keys
}

/// Keys to forget after a price mutation for `item_id`.
pub fn price_invalidation_set(item_id: i64) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::CurrentPrice(item_id)];
    for days in COMMON_HISTORY_WINDOWS {
        keys.push(CacheKey::PriceHistory { item_id, days });
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_keys_match_wire_contract() {
        assert_eq!(CacheKey::InventoryItem(7).render(), "inventory:item:7");
        assert_eq!(
            CacheKey::InventoryList { skip: 0, limit: 100 }.render(),
            "inventory:list:0:100"
        );
        assert_eq!(CacheKey::CurrentPrice(3).render(), "price:current:3");
        assert_eq!(
            CacheKey::PriceHistory { item_id: 3, days: 30 }.render(),
            "price:history:3:30"
        );
        assert_eq!(
            CacheKey::LowStock { threshold: 10 }.render(),
            "alerts:low_stock:10"
        );
        assert_eq!(
            CacheKey::PriceChanges { threshold: 5, hours: 24 }.render(),
            "alerts:price_changes:5:24"
        );
    }

    #[test]
    fn ttl_classes() {
        assert_eq!(CacheKey::InventoryItem(1).ttl().as_secs(), 600);
        assert_eq!(CacheKey::InventoryList { skip: 0, limit: 100 }.ttl().as_secs(), 300);
        assert_eq!(CacheKey::CurrentPrice(1).ttl().as_secs(), 1800);
        assert_eq!(CacheKey::PriceHistory { item_id: 1, days: 7 }.ttl().as_secs(), 3600);
        assert_eq!(CacheKey::LowStock { threshold: 10 }.ttl().as_secs(), 120);
    }

    #[test]
    fn inventory_invalidation_enumerates_bounded_windows() {
        let keys = inventory_invalidation_set(Some(42));
        assert!(keys.contains(&CacheKey::InventoryItem(42)));
        assert!(keys.contains(&CacheKey::InventoryList { skip: 0, limit: 100 }));
        assert!(keys.contains(&CacheKey::InventoryList { skip: 900, limit: 100 }));
        assert!(!keys.contains(&CacheKey::InventoryList { skip: 1000, limit: 100 }));
        for threshold in [5, 10, 20, 50] {
            assert!(keys.contains(&CacheKey::LowStock { threshold }));
        }

        let without_item = inventory_invalidation_set(None);
        assert_eq!(without_item.len(), keys.len() - 1);
    }

    #[test]
    fn price_invalidation_covers_current_and_history_windows() {
        let keys = price_invalidation_set(9);
        assert!(keys.contains(&CacheKey::CurrentPrice(9)));
        for days in [7, 30, 90] {
            assert!(keys.contains(&CacheKey::PriceHistory { item_id: 9, days }));
        }
    }
}
