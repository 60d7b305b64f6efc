//! Rental contracts with franchise/overage billing
//!
//! A contract charges a fixed monthly fee that includes a pooled page
//! franchise across its printers; pages above the franchise are charged at
//! the overage price. The billed total is then allocated back to each
//! printer in proportion to the pages it printed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::MonthPeriod;
use crate::validation::round_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Suspended,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Suspended => "suspended",
            ContractStatus::Terminated => "terminated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ContractStatus::Active),
            "suspended" => Some(ContractStatus::Suspended),
            "terminated" => Some(ContractStatus::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Issued,
    Voided,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Issued => "issued",
            BillingStatus::Voided => "voided",
        }
    }
}

/// Commercial terms of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingTerms {
    pub monthly_fee: Decimal,
    pub franchise_pages: i64,
    pub overage_price: Decimal,
}

/// Counter readings of one printer for a billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterReading {
    pub printer_id: Uuid,
    pub previous_counter: i64,
    pub current_counter: i64,
}

impl PrinterReading {
    pub fn pages(&self) -> i64 {
        self.current_counter - self.previous_counter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingLine {
    pub printer_id: Uuid,
    pub previous_counter: i64,
    pub current_counter: i64,
    pub pages: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingComputation {
    pub pages: i64,
    pub excess_pages: i64,
    pub monthly_fee: Decimal,
    pub overage_amount: Decimal,
    pub total: Decimal,
    pub lines: Vec<BillingLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("Contract has no printers attached")]
    NoPrinters,

    #[error("Reading {current} for printer {printer_id} is below the previous counter {previous}")]
    ReadingBelowBaseline {
        printer_id: Uuid,
        previous: i64,
        current: i64,
    },

    #[error("Contract fee, franchise and overage price must not be negative")]
    NegativeTerms,

    #[error("Billing day must be between 1 and 28")]
    InvalidBillingDay,

    #[error("Billing amount is too large")]
    AmountTooLarge,
}

impl BillingTerms {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.monthly_fee < Decimal::ZERO
            || self.franchise_pages < 0
            || self.overage_price < Decimal::ZERO
        {
            return Err(BillingError::NegativeTerms);
        }
        Ok(())
    }
}

pub fn validate_billing_day(day: i32) -> Result<(), BillingError> {
    if (1..=28).contains(&day) {
        Ok(())
    } else {
        Err(BillingError::InvalidBillingDay)
    }
}

/// Compute the billing of one period from the readings of every attached printer
pub fn compute_billing(
    terms: &BillingTerms,
    readings: &[PrinterReading],
) -> Result<BillingComputation, BillingError> {
    terms.validate()?;
    if readings.is_empty() {
        return Err(BillingError::NoPrinters);
    }
    if let Some(r) = readings.iter().find(|r| r.pages() < 0) {
        return Err(BillingError::ReadingBelowBaseline {
            printer_id: r.printer_id,
            previous: r.previous_counter,
            current: r.current_counter,
        });
    }

    let pages: i64 = readings.iter().map(PrinterReading::pages).sum();
    let excess_pages = (pages - terms.franchise_pages).max(0);
    let monthly_fee = round_money(terms.monthly_fee);
    let overage_amount = Decimal::from(excess_pages)
        .checked_mul(terms.overage_price)
        .map(round_money)
        .ok_or(BillingError::AmountTooLarge)?;
    let total = monthly_fee
        .checked_add(overage_amount)
        .filter(|t| t.checked_mul(Decimal::ONE_HUNDRED).is_some())
        .ok_or(BillingError::AmountTooLarge)?;

    let weights: Vec<i64> = readings.iter().map(PrinterReading::pages).collect();
    let amounts = allocate_proportionally(total, &weights);

    let lines = readings
        .iter()
        .zip(amounts)
        .map(|(r, amount)| BillingLine {
            printer_id: r.printer_id,
            previous_counter: r.previous_counter,
            current_counter: r.current_counter,
            pages: r.pages(),
            amount,
        })
        .collect();

    Ok(BillingComputation {
        pages,
        excess_pages,
        monthly_fee,
        overage_amount,
        total,
        lines,
    })
}

/// Split `total` (rounded to cents) across `weights`, proportionally.
///
/// Every share is a whole number of cents and the shares sum exactly to the
/// rounded total. Leftover cents go to the largest fractional parts, ties to
/// the earlier position. All-zero weights split evenly.
pub fn allocate_proportionally(total: Decimal, weights: &[i64]) -> Vec<Decimal> {
    if weights.is_empty() {
        return Vec::new();
    }
    let hundred = Decimal::from(100);
    let cents = round_money(total) * hundred;

    let sum: i64 = weights.iter().map(|w| (*w).max(0)).sum();
    let effective: Vec<Decimal> = if sum == 0 {
        vec![Decimal::ONE; weights.len()]
    } else {
        weights.iter().map(|w| Decimal::from((*w).max(0))).collect()
    };
    let weight_total: Decimal = effective.iter().copied().sum();

    let exact: Vec<Decimal> = effective
        .iter()
        .map(|w| {
            cents
                .checked_mul(*w)
                .map(|c| c / weight_total)
                .unwrap_or_else(|| cents * (*w / weight_total))
        })
        .collect();
    let mut shares: Vec<Decimal> = exact.iter().map(|e| e.floor()).collect();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|a, b| {
        let fa = exact[*a] - shares[*a];
        let fb = exact[*b] - shares[*b];
        fb.cmp(&fa).then(a.cmp(b))
    });

    let mut remaining = cents - shares.iter().copied().sum::<Decimal>();
    for idx in order.iter().cycle() {
        if remaining <= Decimal::ZERO {
            break;
        }
        shares[*idx] += Decimal::ONE;
        remaining -= Decimal::ONE;
    }

    shares.into_iter().map(|s| s / hundred).collect()
}

/// Due date of the receivable raised for `period`: the billing day of the
/// following month
pub fn billing_due_date(period: MonthPeriod, billing_day: i32) -> NaiveDate {
    period.next().day_clamped(billing_day.clamp(1, 28) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

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

    #[test]
    fn test_within_franchise_bills_fee_only() {
        let result = compute_billing(&terms(), &[reading(0, 2000), reading(100, 1100)]).unwrap();
        assert_eq!(result.pages, 3000);
        assert_eq!(result.excess_pages, 0);
        assert_eq!(result.overage_amount, Decimal::ZERO);
        assert_eq!(result.total, dec("300.00"));
        assert_eq!(result.lines[0].amount, dec("200.00"));
        assert_eq!(result.lines[1].amount, dec("100.00"));
    }

    #[test]
    fn test_overage_charged_on_pooled_pages() {
        let result = compute_billing(&terms(), &[reading(0, 4000), reading(0, 2000)]).unwrap();
        assert_eq!(result.excess_pages, 1000);
        assert_eq!(result.overage_amount, dec("50.00"));
        assert_eq!(result.total, dec("350.00"));
        let sum: Decimal = result.lines.iter().map(|l| l.amount).sum();
        assert_eq!(sum, result.total);
    }

    #[test]
    fn test_reading_below_baseline() {
        let r = reading(500, 400);
        let err = compute_billing(&terms(), &[r]).unwrap_err();
        assert!(matches!(err, BillingError::ReadingBelowBaseline { .. }));
    }

    #[test]
    fn test_no_printers() {
        assert_eq!(compute_billing(&terms(), &[]).unwrap_err(), BillingError::NoPrinters);
    }

    #[test]
    fn test_allocation_gives_leftover_cents_to_largest_fraction() {
        let shares = allocate_proportionally(dec("100.00"), &[1, 1, 1]);
        assert_eq!(shares, vec![dec("33.34"), dec("33.33"), dec("33.33")]);
    }

    #[test]
    fn test_allocation_zero_pages_splits_evenly() {
        let shares = allocate_proportionally(dec("10.00"), &[0, 0]);
        assert_eq!(shares, vec![dec("5.00"), dec("5.00")]);
    }

    #[test]
    fn test_allocation_follows_weights() {
        let shares = allocate_proportionally(dec("0.10"), &[2, 1]);
        // 6.666.. and 3.333.. cents
        assert_eq!(shares, vec![dec("0.07"), dec("0.03")]);
    }

    #[test]
    fn test_billing_due_date_next_month() {
        let period = MonthPeriod::new(2024, 12).unwrap();
        assert_eq!(
            billing_due_date(period, 10),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
        );
    }

    #[test]
    fn test_billing_day_range() {
        assert!(validate_billing_day(1).is_ok());
        assert!(validate_billing_day(28).is_ok());
        assert!(validate_billing_day(29).is_err());
        assert!(validate_billing_day(0).is_err());
    }

    #[test]
    fn test_overage_too_large_is_an_error() {
        let terms = BillingTerms {
            monthly_fee: dec("300.00"),
            franchise_pages: 0,
            overage_price: Decimal::MAX,
        };
        assert_eq!(
            compute_billing(&terms, &[reading(0, 1_000)]),
            Err(BillingError::AmountTooLarge)
        );
    }
}
