//! Stock attention, due alerts and period filter tests

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use shared::{
    aggregate_quantities, canceled_note, classify_stock, due_alert_cutoff, rental_order_note,
    ItemQuantity, MonthPeriod, PeriodFilter, StockAttention,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// At or below the minimum is always critical
    #[test]
    fn prop_at_minimum_is_critical(minimum in 0i32..1000, below in 0i32..1000, margin in 0i32..100) {
        let quantity = minimum - below.min(minimum);
        prop_assert_eq!(classify_stock(quantity, minimum, margin), Some(StockAttention::Critical));
    }

    /// A wider margin never clears an alert
    #[test]
    fn prop_wider_margin_flags_superset(
        quantity in 0i32..2000,
        minimum in 0i32..1000,
        margin in 0i32..100,
        extra in 0i32..100,
    ) {
        if classify_stock(quantity, minimum, margin).is_some() {
            prop_assert!(classify_stock(quantity, minimum, margin + extra).is_some());
        }
    }

    /// Aggregated totals preserve the requested quantity per product
    #[test]
    fn prop_aggregate_preserves_total(quantities in prop::collection::vec((0usize..3, 1i32..50), 1..10)) {
        let products = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let items: Vec<_> = quantities
            .iter()
            .map(|(idx, quantity)| ItemQuantity { product_id: products[*idx], quantity: *quantity })
            .collect();
        let totals = aggregate_quantities(&items);
        let requested: i64 = quantities.iter().map(|(_, q)| i64::from(*q)).sum();
        prop_assert_eq!(totals.values().sum::<i64>(), requested);
        prop_assert!(totals.len() <= 3);
    }
}

#[test]
fn test_low_within_margin() {
    assert_eq!(classify_stock(11, 10, 20), Some(StockAttention::Low));
    assert_eq!(classify_stock(12, 10, 20), Some(StockAttention::Low));
    assert_eq!(classify_stock(13, 10, 20), None);
}

#[test]
fn test_due_alert_cutoff() {
    assert_eq!(due_alert_cutoff(date(2024, 2, 25), 7), date(2024, 3, 3));
    assert_eq!(due_alert_cutoff(date(2024, 2, 25), -3), date(2024, 2, 25));
}

#[test]
fn test_period_filter_crosses_year() {
    let today = date(2024, 1, 15);
    assert_eq!(
        PeriodFilter::CurrentMonth.resolve(today),
        MonthPeriod::new(2024, 1)
    );
    assert_eq!(
        PeriodFilter::LastMonth.resolve(today),
        MonthPeriod::new(2023, 12)
    );
    assert_eq!(PeriodFilter::All.resolve(today), None);
}

#[test]
fn test_month_bounds() {
    let february = MonthPeriod::new(2024, 2).unwrap();
    assert_eq!(february.first_day(), date(2024, 2, 1));
    assert_eq!(february.end_exclusive(), date(2024, 3, 1));
    assert_eq!(february.day_clamped(31), date(2024, 2, 29));
    assert!(MonthPeriod::new(2024, 13).is_none());
}

#[test]
fn test_movement_notes() {
    assert_eq!(rental_order_note(12, Some("M404 | S/N: X | MLT: 1")), "Order #12 - M404 | S/N: X | MLT: 1");
    assert_eq!(canceled_note(Some("Order #12"), Some("wrong client")), "Order #12 [CANCELED: wrong client]");
    assert_eq!(canceled_note(None, None), "[CANCELED]");
}
