//! Pricing arithmetic: final price, margin, and change classification.

use crate::domain::types::{ChangeSignificance, PriceAlertKind};

/// Percent magnitude at or above which a change is classified as major.
pub const MAJOR_CHANGE_PERCENT: f64 = 20.0;

/// The price a buyer actually pays: the discount price when one is set.
pub fn final_price(selling_price: f64, discount_price: Option<f64>) -> f64 {
    discount_price.unwrap_or(selling_price)
}

/// Profit margin as a percentage of the final price.
///
/// Returns 0 when the cost price is not positive, so untracked costs never
/// produce a nonsense margin.
pub fn calculated_margin(selling_price: f64, discount_price: Option<f64>, cost_price: f64) -> f64 {
    if cost_price <= 0.0 {
        return 0.0;
    }
    let final_price = final_price(selling_price, discount_price);
    (final_price - cost_price) / final_price * 100.0
}

/// Absolute change between two recorded prices.
pub fn change_amount(old_price: f64, new_price: f64) -> f64 {
    new_price - old_price
}

/// Relative change between two recorded prices, in percent.
///
/// Guarded: a non-positive old price yields 0 rather than a division error.
pub fn change_percent(old_price: f64, new_price: f64) -> f64 {
    if old_price <= 0.0 {
        return 0.0;
    }
    (new_price - old_price) / old_price * 100.0
}

/// Bucket a recorded transition by the absolute percent moved.
pub fn change_significance(price_change_percent: f64) -> ChangeSignificance {
    let magnitude = price_change_percent.abs();
    if magnitude >= 20.0 {
        ChangeSignificance::Major
    } else if magnitude >= 10.0 {
        ChangeSignificance::Significant
    } else if magnitude >= 5.0 {
        ChangeSignificance::Moderate
    } else {
        ChangeSignificance::Minor
    }
}

/// True when the absolute percent moved reaches the configured threshold.
///
/// `threshold` is a fraction (0.05 = 5%), matching the configuration surface.
pub fn is_significant_change(old_price: f64, new_price: f64, threshold: f64) -> bool {
    change_percent(old_price, new_price).abs() >= threshold * 100.0
}

/// Classify a significant transition for alerting.
pub fn alert_kind(old_price: f64, new_price: f64) -> PriceAlertKind {
    if change_percent(old_price, new_price).abs() >= MAJOR_CHANGE_PERCENT {
        PriceAlertKind::MajorChange
    } else if new_price > old_price {
        PriceAlertKind::SignificantIncrease
    } else {
        PriceAlertKind::SignificantDecrease
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_price_prefers_discount() {
        assert_eq!(final_price(12000.0, Some(10800.0)), 10800.0);
        assert_eq!(final_price(12000.0, None), 12000.0);
    }

    #[test]
    fn margin_uses_final_price() {
        let margin = calculated_margin(12000.0, Some(10800.0), 8000.0);
        assert!((margin - 25.925925925925924).abs() < 1e-9);
    }

    #[test]
    fn margin_guard_on_free_cost() {
        assert_eq!(calculated_margin(12000.0, None, 0.0), 0.0);
        assert_eq!(calculated_margin(12000.0, None, -5.0), 0.0);
    }

    #[test]
    fn percent_guard_on_zero_old_price() {
        assert_eq!(change_percent(0.0, 500.0), 0.0);
        assert_eq!(change_percent(-1.0, 500.0), 0.0);
    }

    #[test]
    fn percent_is_signed() {
        assert!((change_percent(12000.0, 9000.0) - -25.0).abs() < 1e-9);
        assert!((change_percent(100.0, 112.0) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn significance_buckets() {
        assert_eq!(change_significance(25.0), ChangeSignificance::Major);
        assert_eq!(change_significance(-25.0), ChangeSignificance::Major);
        assert_eq!(change_significance(12.0), ChangeSignificance::Significant);
        assert_eq!(change_significance(7.0), ChangeSignificance::Moderate);
        assert_eq!(change_significance(2.0), ChangeSignificance::Minor);
    }

    #[test]
    fn significance_boundaries_are_inclusive() {
        assert_eq!(change_significance(20.0), ChangeSignificance::Major);
        assert_eq!(change_significance(10.0), ChangeSignificance::Significant);
        assert_eq!(change_significance(5.0), ChangeSignificance::Moderate);
        assert_eq!(change_significance(4.999), ChangeSignificance::Minor);
    }

    #[test]
    fn threshold_check_uses_absolute_magnitude() {
        assert!(is_significant_change(12000.0, 9000.0, 0.05));
        assert!(is_significant_change(100.0, 105.0, 0.05));
        assert!(!is_significant_change(100.0, 104.9, 0.05));
    }

    #[test]
    fn alert_kind_splits_at_major_then_by_direction() {
        assert_eq!(alert_kind(12000.0, 9000.0), PriceAlertKind::MajorChange);
        assert_eq!(alert_kind(100.0, 112.0), PriceAlertKind::SignificantIncrease);
        assert_eq!(alert_kind(100.0, 88.0), PriceAlertKind::SignificantDecrease);
    }
}
