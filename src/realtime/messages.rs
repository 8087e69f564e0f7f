//! Wire messages for the realtime surface.
//!
//! Envelopes travel twice: once straight to locally-held sockets and once
//! over the bus for other service instances. The `origin` id lets a
//! listener drop its own bus echo so clients see each event exactly once
//! per process.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    entities::{InventoryItemRecord, PriceRecord},
    types::{PriceAlertKind, StockStatus, UpdateAction},
};

/// Connection group a WebSocket client belongs to, chosen at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Inventory,
    Price,
    Alerts,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [Self::Inventory, Self::Price, Self::Alerts];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Price => "price",
            Self::Alerts => "alerts",
        }
    }

    /// Classify a connection by its request path; `fallback` when no
    /// segment matches.
    pub fn from_path(path: &str, fallback: StreamKind) -> StreamKind {
        if path.contains("inventory") {
            Self::Inventory
        } else if path.contains("price") {
            Self::Price
        } else if path.contains("alert") {
            Self::Alerts
        } else {
            fallback
        }
    }
}

/// Event discriminator carried in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    InventoryUpdate,
    PriceUpdate,
    StockAlert,
    PriceAlert,
    SystemNotification,
}

/// The frame every realtime consumer receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub origin: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Stamped by the bus listener on relay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub received_at: Option<OffsetDateTime>,
}

impl Envelope {
    pub fn new<T: Serialize>(
        kind: EventKind,
        origin: Uuid,
        data: &T,
        severity: Option<String>,
    ) -> Self {
        Self {
            kind,
            data: serde_json::to_value(data).expect("event payload serializable"),
            timestamp: OffsetDateTime::now_utc(),
            origin,
            severity,
            channel: None,
            received_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub action: UpdateAction,
    pub item: InventoryEventItem,
}

/// Stock-relevant slice of an inventory item carried in update events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEventItem {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub stock_quantity: i32,
    pub available_quantity: i32,
    pub is_low_stock: bool,
    pub stock_status: StockStatus,
}

impl From<&InventoryItemRecord> for InventoryEventItem {
    fn from(record: &InventoryItemRecord) -> Self {
        Self {
            id: record.id,
            sku: record.sku.clone(),
            name: record.name.clone(),
            stock_quantity: record.stock_quantity,
            available_quantity: record.available_quantity,
            is_low_stock: record.is_low_stock(),
            stock_status: record.stock_status(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAlert {
    pub item_id: i64,
    pub sku: String,
    pub name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
    pub alert_level: String,
    pub message: String,
}

impl StockAlert {
    /// Build the alert for an item that crossed its minimum level.
    pub fn for_item(record: &InventoryItemRecord) -> Self {
        let depleted = record.available_quantity <= 0;
        let alert_level = if depleted { "critical" } else { "warning" };
        let message = format!(
            "Stock level for {} is {}",
            record.sku,
            if depleted {
                "out of stock"
            } else {
                "below minimum threshold"
            }
        );
        Self {
            item_id: record.id,
            sku: record.sku.clone(),
            name: record.name.clone(),
            current_stock: record.available_quantity,
            min_stock_level: record.min_stock_level,
            alert_level: alert_level.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub action: UpdateAction,
    pub price: PriceEventBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEventBody {
    pub id: i64,
    pub inventory_id: i64,
    pub selling_price: f64,
    pub cost_price: f64,
    pub discount_price: Option<f64>,
    pub final_price: f64,
    pub margin_percent: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub effective_from: OffsetDateTime,
}

impl From<&PriceRecord> for PriceEventBody {
    fn from(record: &PriceRecord) -> Self {
        Self {
            id: record.id,
            inventory_id: record.inventory_id,
            selling_price: record.selling_price,
            cost_price: record.cost_price,
            discount_price: record.discount_price,
            final_price: record.final_price(),
            margin_percent: record.calculated_margin(),
            effective_from: record.effective_from,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangeAlert {
    pub inventory_id: i64,
    pub sku: String,
    pub item_name: String,
    pub old_price: f64,
    pub new_price: f64,
    pub change_percent: f64,
    pub change_amount: f64,
    pub alert_type: PriceAlertKind,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_classification_with_fallback() {
        assert_eq!(
            StreamKind::from_path("/ws/inventory", StreamKind::Alerts),
            StreamKind::Inventory
        );
        assert_eq!(
            StreamKind::from_path("/ws/price", StreamKind::Alerts),
            StreamKind::Price
        );
        assert_eq!(
            StreamKind::from_path("/ws/alerts", StreamKind::Inventory),
            StreamKind::Alerts
        );
        assert_eq!(
            StreamKind::from_path("/ws/other", StreamKind::Price),
            StreamKind::Price
        );
    }

    #[test]
    fn envelope_round_trips_and_keeps_origin() {
        let origin = Uuid::new_v4();
        let envelope = Envelope::new(
            EventKind::StockAlert,
            origin,
            &serde_json::json!({"item_id": 1}),
            Some("critical".to_string()),
        );

        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains("\"type\":\"stock_alert\""));

        let parsed: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.origin, origin);
        assert_eq!(parsed.severity.as_deref(), Some("critical"));
        assert!(parsed.channel.is_none());
        assert!(parsed.received_at.is_none());
    }

    #[test]
    fn stock_alert_message_reflects_depletion() {
        use time::macros::datetime;

        let mut record = InventoryItemRecord {
            id: 1,
            sku: "PROD-001".into(),
            name: "Headphones".into(),
            description: None,
            category: None,
            stock_quantity: 8,
            reserved_quantity: 5,
            available_quantity: 3,
            weight: None,
            dimensions: None,
            cost_price: 0.0,
            min_stock_level: 10,
            max_stock_level: 100,
            is_active: true,
            is_trackable: true,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        };

        let alert = StockAlert::for_item(&record);
        assert_eq!(alert.alert_level, "warning");
        assert!(alert.message.contains("below minimum threshold"));

        record.available_quantity = 0;
        let alert = StockAlert::for_item(&record);
        assert_eq!(alert.alert_level, "critical");
        assert!(alert.message.contains("out of stock"));
    }
}
