//! Shared domain enumerations.
//!
//! The string forms of these enums are part of the wire contract between
//! service instances and dashboard clients; they must remain stable.

use serde::{Deserialize, Serialize};

/// Sellability bucket derived from available quantity vs. the minimum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

/// Alert level reported by the low-stock rollup.
///
/// `Critical` marks items at or below half their minimum stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAlertLevel {
    OutOfStock,
    Critical,
    Low,
}

/// How a recorded price transition came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Manual,
    Automatic,
    BulkUpdate,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
            Self::BulkUpdate => "bulk_update",
        }
    }
}

/// Magnitude bucket for a recorded price transition, by absolute percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSignificance {
    Major,
    Significant,
    Moderate,
    Minor,
}

/// Classification attached to a significant price-change alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceAlertKind {
    MajorChange,
    SignificantIncrease,
    SignificantDecrease,
}

impl PriceAlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MajorChange => "major_change",
            Self::SignificantIncrease => "significant_increase",
            Self::SignificantDecrease => "significant_decrease",
        }
    }
}

/// CRUD action carried by inventory/price update events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    Created,
    Updated,
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_forms_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&StockStatus::OutOfStock).unwrap(),
            "\"out_of_stock\""
        );
        assert_eq!(
            serde_json::to_string(&StockAlertLevel::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::to_string(&PriceAlertKind::SignificantDecrease).unwrap(),
            "\"significant_decrease\""
        );
        assert_eq!(
            serde_json::to_string(&UpdateAction::Created).unwrap(),
            "\"created\""
        );
    }

    #[test]
    fn change_type_round_trips() {
        let parsed: ChangeType = serde_json::from_str("\"bulk_update\"").unwrap();
        assert_eq!(parsed, ChangeType::BulkUpdate);
        assert_eq!(parsed.as_str(), "bulk_update");
    }
}
