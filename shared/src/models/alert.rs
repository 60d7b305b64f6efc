//! Stock attention and due-date alert rules

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default attention margin, in percent above the minimum
pub const DEFAULT_ATTENTION_MARGIN_PCT: i32 = 20;

/// Default number of days ahead that a due sale is flagged
pub const DEFAULT_DUE_ALERT_DAYS: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAttention {
    Critical,
    Low,
}

/// Classify a product's stock against its minimum. `None` means no alert.
///
/// Critical at or below the minimum; Low at or below the minimum raised by
/// `margin_pct` percent.
pub fn classify_stock(quantity: i32, minimum: i32, margin_pct: i32) -> Option<StockAttention> {
    if quantity <= minimum {
        return Some(StockAttention::Critical);
    }
    let threshold = Decimal::from(minimum) * (Decimal::ONE + Decimal::from(margin_pct) / Decimal::from(100));
    if Decimal::from(quantity) <= threshold {
        Some(StockAttention::Low)
    } else {
        None
    }
}

/// Last due date that still raises an alert
pub fn due_alert_cutoff(today: NaiveDate, due_alert_days: i32) -> NaiveDate {
    today + Duration::days(i64::from(due_alert_days.max(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stock() {
        assert_eq!(classify_stock(5, 5, 20), Some(StockAttention::Critical));
        assert_eq!(classify_stock(0, 5, 20), Some(StockAttention::Critical));
        assert_eq!(classify_stock(6, 5, 20), Some(StockAttention::Low));
        assert_eq!(classify_stock(7, 5, 20), None);
        // 10 * 1.2 = 12
        assert_eq!(classify_stock(12, 10, 20), Some(StockAttention::Low));
        assert_eq!(classify_stock(13, 10, 20), None);
    }

    #[test]
    fn test_zero_margin_only_critical() {
        assert_eq!(classify_stock(6, 5, 0), None);
        assert_eq!(classify_stock(5, 5, 0), Some(StockAttention::Critical));
    }

    #[test]
    fn test_due_alert_cutoff() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 25).unwrap();
        assert_eq!(
            due_alert_cutoff(today, 7),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert_eq!(due_alert_cutoff(today, -3), today);
    }
}
