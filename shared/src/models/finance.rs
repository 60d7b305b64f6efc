//! Ledger models: receivables, payables and their effect on bank balances

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Receivable,
    Payable,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Receivable => "receivable",
            EntryKind::Payable => "payable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receivable" => Some(EntryKind::Receivable),
            "payable" => Some(EntryKind::Payable),
            _ => None,
        }
    }

    /// Signed effect of settling `amount` on the bank balance
    pub fn settlement_effect(&self, amount: Decimal) -> Decimal {
        match self {
            EntryKind::Receivable => amount,
            EntryKind::Payable => -amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Open,
    Settled,
    Canceled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Open => "open",
            EntryStatus::Settled => "settled",
            EntryStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(EntryStatus::Open),
            "settled" => Some(EntryStatus::Settled),
            "canceled" => Some(EntryStatus::Canceled),
            _ => None,
        }
    }
}

/// Document that raised a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Manual,
    Sale,
    PurchaseOrder,
    ContractBilling,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Manual => "manual",
            EntrySource::Sale => "sale",
            EntrySource::PurchaseOrder => "purchase_order",
            EntrySource::ContractBilling => "contract_billing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(EntrySource::Manual),
            "sale" => Some(EntrySource::Sale),
            "purchase_order" => Some(EntrySource::PurchaseOrder),
            "contract_billing" => Some(EntrySource::ContractBilling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Entry is {0}, expected {1}")]
    InvalidTransition(&'static str, &'static str),
}

/// Check a status transition of a ledger entry
pub fn check_transition(current: EntryStatus, target: EntryStatus) -> Result<(), LedgerError> {
    let allowed = matches!(
        (current, target),
        (EntryStatus::Open, EntryStatus::Settled)
            | (EntryStatus::Settled, EntryStatus::Open)
            | (EntryStatus::Open, EntryStatus::Canceled)
    );
    if allowed {
        Ok(())
    } else {
        let expected = match target {
            EntryStatus::Settled | EntryStatus::Canceled => EntryStatus::Open.as_str(),
            EntryStatus::Open => EntryStatus::Settled.as_str(),
        };
        Err(LedgerError::InvalidTransition(current.as_str(), expected))
    }
}

pub fn is_overdue(status: EntryStatus, due_date: NaiveDate, today: NaiveDate) -> bool {
    status == EntryStatus::Open && due_date < today
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_settlement_effect_sign() {
        let amount = Decimal::from_str("150.25").unwrap();
        assert_eq!(EntryKind::Receivable.settlement_effect(amount), amount);
        assert_eq!(EntryKind::Payable.settlement_effect(amount), -amount);
    }

    #[test]
    fn test_transitions() {
        assert!(check_transition(EntryStatus::Open, EntryStatus::Settled).is_ok());
        assert!(check_transition(EntryStatus::Settled, EntryStatus::Open).is_ok());
        assert!(check_transition(EntryStatus::Open, EntryStatus::Canceled).is_ok());
        assert!(check_transition(EntryStatus::Settled, EntryStatus::Canceled).is_err());
        assert!(check_transition(EntryStatus::Canceled, EntryStatus::Open).is_err());
        assert!(check_transition(EntryStatus::Settled, EntryStatus::Settled).is_err());
    }

    #[test]
    fn test_overdue() {
        let due = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 6, 11).unwrap();
        assert!(is_overdue(EntryStatus::Open, due, after));
        assert!(!is_overdue(EntryStatus::Open, due, due));
        assert!(!is_overdue(EntryStatus::Settled, due, after));
    }
}
