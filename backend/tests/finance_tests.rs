//! Receivables and payables tests

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use shared::{
    check_transition, compute_totals, is_overdue, purchase_document_number, EntryKind,
    EntryStatus, LedgerError, PricedLine,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn status_strategy() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        Just(EntryStatus::Open),
        Just(EntryStatus::Settled),
        Just(EntryStatus::Canceled),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Settling then reopening leaves the bank balance where it was
    #[test]
    fn prop_settle_and_reopen_cancel_out(
        cents in 1i64..100_000_000,
        opening in -100_000_000i64..100_000_000,
        receivable in any::<bool>(),
    ) {
        let kind = if receivable { EntryKind::Receivable } else { EntryKind::Payable };
        let amount = Decimal::new(cents, 2);
        let balance = Decimal::new(opening, 2);
        let settled = balance + kind.settlement_effect(amount);
        prop_assert_eq!(settled - kind.settlement_effect(amount), balance);
        if receivable {
            prop_assert!(settled > balance);
        } else {
            prop_assert!(settled < balance);
        }
    }

    /// Canceled is terminal
    #[test]
    fn prop_canceled_entries_never_move(target in status_strategy()) {
        prop_assert!(check_transition(EntryStatus::Canceled, target).is_err());
    }

    /// Purchase totals are items plus freight, in cents
    #[test]
    fn prop_purchase_total_includes_freight(
        lines in prop::collection::vec((1i32..100, 1i64..100_000), 1..6),
        freight_cents in 0i64..100_000,
    ) {
        let priced: Vec<_> = lines
            .iter()
            .map(|(quantity, cents)| PricedLine { quantity: *quantity, unit_price: Decimal::new(*cents, 2) })
            .collect();
        let totals = compute_totals(&priced, Decimal::new(freight_cents, 2)).unwrap();
        prop_assert_eq!(totals.total, totals.items_total + totals.freight);
        prop_assert_eq!(totals.total.round_dp(2), totals.total);
    }
}

#[test]
fn test_allowed_transitions() {
    assert!(check_transition(EntryStatus::Open, EntryStatus::Settled).is_ok());
    assert!(check_transition(EntryStatus::Settled, EntryStatus::Open).is_ok());
    assert!(check_transition(EntryStatus::Open, EntryStatus::Canceled).is_ok());
}

#[test]
fn test_settled_entry_cannot_be_canceled_directly() {
    assert_eq!(
        check_transition(EntryStatus::Settled, EntryStatus::Canceled),
        Err(LedgerError::InvalidTransition("settled", "open"))
    );
    assert_eq!(
        check_transition(EntryStatus::Open, EntryStatus::Open),
        Err(LedgerError::InvalidTransition("open", "settled"))
    );
}

#[test]
fn test_overdue_only_for_open_entries_past_due() {
    let today = date(2024, 3, 15);
    assert!(is_overdue(EntryStatus::Open, date(2024, 3, 14), today));
    assert!(!is_overdue(EntryStatus::Open, today, today));
    assert!(!is_overdue(EntryStatus::Settled, date(2024, 1, 1), today));
    assert!(!is_overdue(EntryStatus::Canceled, date(2024, 1, 1), today));
}

#[test]
fn test_purchase_totals_round_each_line() {
    let totals = compute_totals(
        &[
            PricedLine {
                quantity: 3,
                unit_price: Decimal::new(3335, 3),
            },
            PricedLine {
                quantity: 2,
                unit_price: Decimal::new(1000, 2),
            },
        ],
        Decimal::new(1550, 2),
    )
    .unwrap();
    // 3 x 3.335 = 10.005 -> 10.01
    assert_eq!(totals.items_total, Decimal::new(3001, 2));
    assert_eq!(totals.total, Decimal::new(4551, 2));
    assert_eq!(purchase_document_number(7), "PC-7");
}
