//! Stock position tests
//!
//! Property-based and unit tests for quantities on hand and the
//! weighted-average cost kept across entries, exits and cancellations.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::{StockError, StockPosition, AVERAGE_COST_SCALE};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Unit costs between R$ 0,01 and R$ 1.000,00
fn cost_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity_strategy() -> impl Strategy<Value = i32> {
    1i32..=500
}

/// Averages as stored, up to ten decimal places
fn average_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000_000_000).prop_map(|units| Decimal::new(units, AVERAGE_COST_SCALE))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The first entry sets the average to its own unit cost
    #[test]
    fn prop_first_entry_sets_average(qty in quantity_strategy(), cost in cost_strategy()) {
        let position = StockPosition::empty().receive(qty, cost).unwrap();
        prop_assert_eq!(position.quantity, qty);
        prop_assert_eq!(position.average_cost, cost);
    }

    /// A blended average always lies between the two entry costs
    #[test]
    fn prop_average_between_entry_costs(
        q1 in quantity_strategy(),
        c1 in cost_strategy(),
        q2 in quantity_strategy(),
        c2 in cost_strategy(),
    ) {
        let position = StockPosition::empty()
            .receive(q1, c1).unwrap()
            .receive(q2, c2).unwrap();
        prop_assert_eq!(position.quantity, q1 + q2);
        prop_assert!(position.average_cost >= c1.min(c2));
        prop_assert!(position.average_cost <= c1.max(c2));
        prop_assert!(position.average_cost.scale() <= AVERAGE_COST_SCALE);
    }

    /// Exits never drive the quantity below zero
    #[test]
    fn prop_withdraw_never_negative(on_hand in 0i32..=200, requested in quantity_strategy()) {
        let position = StockPosition::new(on_hand, dec("10"));
        match position.withdraw(requested) {
            Ok(after) => {
                prop_assert!(requested <= on_hand);
                prop_assert_eq!(after.quantity, on_hand - requested);
                prop_assert_eq!(after.average_cost, position.average_cost);
            }
            Err(err) => {
                prop_assert!(requested > on_hand);
                prop_assert_eq!(err, StockError::Insufficient { available: on_hand, requested });
            }
        }
    }

    /// Canceling an exit puts back exactly what left
    #[test]
    fn prop_restore_undoes_withdraw(
        on_hand in 1i32..=200,
        cost in cost_strategy(),
        fraction in 1i32..=100,
    ) {
        let position = StockPosition::new(on_hand, cost);
        let qty = (on_hand * fraction / 100).max(1);
        let restored = position.withdraw(qty).unwrap().restore(qty).unwrap();
        prop_assert_eq!(restored, position);
    }

    /// Reverting the only entry leaves an empty position
    #[test]
    fn prop_revert_only_entry_empties(qty in quantity_strategy(), cost in cost_strategy()) {
        let position = StockPosition::empty().receive(qty, cost).unwrap();
        let reverted = position.revert_entry(qty, cost, None).unwrap();
        prop_assert_eq!(reverted.quantity, 0);
        prop_assert_eq!(reverted.average_cost, Decimal::ZERO);
    }

    /// Receiving into stock on hand and then canceling that entry gives back
    /// the exact prior position
    #[test]
    fn prop_revert_entry_restores_stock_on_hand(
        q0 in quantity_strategy(),
        c0 in average_strategy(),
        qty in quantity_strategy(),
        cost in cost_strategy(),
    ) {
        let before = StockPosition::new(q0, c0);
        let after = before.receive(qty, cost).unwrap();
        let reverted = after.revert_entry(qty, cost, Some(before)).unwrap();
        prop_assert_eq!(reverted, before);
    }

    /// Editing the latest entry is the same as receiving the corrected entry
    #[test]
    fn prop_revise_latest_entry_matches_direct_receive(
        q0 in quantity_strategy(),
        c0 in average_strategy(),
        qty in quantity_strategy(),
        cost in cost_strategy(),
        new_qty in quantity_strategy(),
        new_cost in cost_strategy(),
    ) {
        let before = StockPosition::new(q0, c0);
        let after = before.receive(qty, cost).unwrap();
        let revised = after
            .revise_entry(qty, cost, new_qty, new_cost, Some(before))
            .unwrap();
        prop_assert_eq!(revised, before.receive(new_qty, new_cost).unwrap());
        let reverted = revised.revert_entry(new_qty, new_cost, Some(before)).unwrap();
        prop_assert_eq!(reverted, before);
    }
}

#[test]
fn test_cancel_entry_restores_repeating_average() {
    let before = StockPosition::new(1, dec("1.00"));
    let after = before.receive(2, dec("2.00")).unwrap();
    assert_eq!(after.average_cost, dec("1.6666666667"));
    assert_eq!(after.revert_entry(2, dec("2.00"), Some(before)).unwrap(), before);
}

#[test]
fn test_oversized_unit_cost_is_rejected() {
    let cost = shared::parse_brl_amount("79228162514264337593543950335");
    assert_eq!(
        StockPosition::empty().receive(2, cost),
        Err(StockError::ValueOverflow)
    );
}

#[test]
fn test_average_cost_after_two_entries() {
    let position = StockPosition::empty()
        .receive(10, dec("5.00"))
        .unwrap()
        .receive(10, dec("7.00"))
        .unwrap();
    assert_eq!(position.quantity, 20);
    assert_eq!(position.average_cost, dec("6"));
    assert_eq!(position.stock_value(), dec("120"));
}

#[test]
fn test_exit_keeps_average() {
    let position = StockPosition::new(20, dec("6")).withdraw(5).unwrap();
    assert_eq!(position.quantity, 15);
    assert_eq!(position.average_cost, dec("6"));
}

#[test]
fn test_entry_requires_positive_cost_and_quantity() {
    let empty = StockPosition::empty();
    assert_eq!(empty.receive(0, dec("1")), Err(StockError::NonPositiveQuantity));
    assert_eq!(empty.receive(5, Decimal::ZERO), Err(StockError::NonPositiveCost));
    assert_eq!(empty.receive(5, dec("-2")), Err(StockError::NonPositiveCost));
}

#[test]
fn test_revise_entry_recomputes_average() {
    // 10 @ 5 then 10 @ 7; the second entry is corrected to 10 @ 9
    let position = StockPosition::new(20, dec("6"));
    let revised = position.revise_entry(10, dec("7"), 10, dec("9"), None).unwrap();
    assert_eq!(revised.quantity, 20);
    assert_eq!(revised.average_cost, dec("7"));
}

#[test]
fn test_revise_entry_to_zero_removes_it() {
    let position = StockPosition::new(20, dec("6"));
    let revised = position.revise_entry(10, dec("7"), 0, Decimal::ZERO, None).unwrap();
    assert_eq!(revised.quantity, 10);
    assert_eq!(revised.average_cost, dec("5"));
}

#[test]
fn test_cancel_entry_already_consumed_is_rejected() {
    // 10 received, 8 already sold
    let position = StockPosition::new(2, dec("5"));
    assert!(matches!(
        position.revert_entry(10, dec("5"), None),
        Err(StockError::Insufficient { .. })
    ));
}
