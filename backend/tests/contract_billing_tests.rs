//! Contract billing tests
//!
//! Franchise and overage arithmetic plus the per-printer split of the total.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    allocate_proportionally, billing_due_date, compute_billing, validate_billing_day,
    BillingError, BillingTerms, MonthPeriod, PrinterReading,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn reading(previous: i64, current: i64) -> PrinterReading {
    PrinterReading {
        printer_id: Uuid::new_v4(),
        previous_counter: previous,
        current_counter: current,
    }
}

fn terms() -> BillingTerms {
    BillingTerms {
        monthly_fee: dec("300.00"),
        franchise_pages: 5000,
        overage_price: dec("0.05"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Shares are whole cents and add up to the rounded total
    #[test]
    fn prop_allocation_sums_to_total(
        cents in 0i64..10_000_000,
        weights in prop::collection::vec(0i64..50_000, 1..8),
    ) {
        let total = Decimal::new(cents, 2);
        let shares = allocate_proportionally(total, &weights);
        prop_assert_eq!(shares.len(), weights.len());
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
        for share in &shares {
            prop_assert!(*share >= Decimal::ZERO);
            prop_assert_eq!(share.round_dp(2), *share);
        }
    }

    /// Line amounts always reconcile with the billing total
    #[test]
    fn prop_billing_lines_reconcile(
        pages in prop::collection::vec(0i64..20_000, 1..6),
        base in 0i64..1_000_000,
    ) {
        let readings: Vec<_> = pages.iter().map(|p| reading(base, base + p)).collect();
        let billing = compute_billing(&terms(), &readings).unwrap();
        let total_pages: i64 = pages.iter().sum();
        prop_assert_eq!(billing.pages, total_pages);
        prop_assert_eq!(billing.excess_pages, (total_pages - 5000).max(0));
        prop_assert_eq!(billing.total, billing.monthly_fee + billing.overage_amount);
        prop_assert_eq!(
            billing.lines.iter().map(|l| l.amount).sum::<Decimal>(),
            billing.total
        );
    }
}

#[test]
fn test_within_franchise_pays_fee_only() {
    let billing = compute_billing(&terms(), &[reading(1000, 3000), reading(0, 2000)]).unwrap();
    assert_eq!(billing.pages, 4000);
    assert_eq!(billing.excess_pages, 0);
    assert_eq!(billing.overage_amount, Decimal::ZERO);
    assert_eq!(billing.total, dec("300.00"));
    assert_eq!(billing.lines[0].amount, dec("150.00"));
    assert_eq!(billing.lines[1].amount, dec("150.00"));
}

#[test]
fn test_overage_charged_per_excess_page() {
    let billing = compute_billing(&terms(), &[reading(0, 6000), reading(0, 1000)]).unwrap();
    assert_eq!(billing.excess_pages, 2000);
    assert_eq!(billing.overage_amount, dec("100.00"));
    assert_eq!(billing.total, dec("400.00"));
}

#[test]
fn test_billing_rejects_counter_below_baseline() {
    let bad = reading(5000, 4000);
    let err = compute_billing(&terms(), &[reading(0, 10), bad]).unwrap_err();
    assert_eq!(
        err,
        BillingError::ReadingBelowBaseline {
            printer_id: bad.printer_id,
            previous: 5000,
            current: 4000,
        }
    );
}

#[test]
fn test_billing_requires_printers() {
    assert_eq!(compute_billing(&terms(), &[]), Err(BillingError::NoPrinters));
}

#[test]
fn test_negative_terms_rejected() {
    let terms = BillingTerms {
        monthly_fee: dec("-1"),
        franchise_pages: 0,
        overage_price: Decimal::ZERO,
    };
    assert_eq!(compute_billing(&terms, &[reading(0, 1)]), Err(BillingError::NegativeTerms));
}

#[test]
fn test_leftover_cent_goes_to_largest_remainder() {
    let shares = allocate_proportionally(dec("100.00"), &[1, 1, 1]);
    assert_eq!(shares, vec![dec("33.34"), dec("33.33"), dec("33.33")]);
}

#[test]
fn test_idle_printers_split_evenly() {
    let shares = allocate_proportionally(dec("10.00"), &[0, 0]);
    assert_eq!(shares, vec![dec("5.00"), dec("5.00")]);
}

#[test]
fn test_billing_day_bounds() {
    assert!(validate_billing_day(1).is_ok());
    assert!(validate_billing_day(28).is_ok());
    assert_eq!(validate_billing_day(0), Err(BillingError::InvalidBillingDay));
    assert_eq!(validate_billing_day(29), Err(BillingError::InvalidBillingDay));
}

#[test]
fn test_due_date_falls_in_following_month() {
    let december = MonthPeriod::new(2024, 12).unwrap();
    assert_eq!(
        billing_due_date(december, 10),
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    );
    let january = MonthPeriod::new(2024, 1).unwrap();
    assert_eq!(
        billing_due_date(january, 28),
        NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()
    );
}
