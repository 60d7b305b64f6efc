//! Supplier purchase order models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validation::{line_total, round_money, sum_amounts, AmountOverflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Delivered,
    Canceled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseOrderStatus::Pending),
            "delivered" => Some(PurchaseOrderStatus::Delivered),
            "canceled" => Some(PurchaseOrderStatus::Canceled),
            _ => None,
        }
    }
}

/// A priced line, before persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn total(&self) -> Result<Decimal, AmountOverflow> {
        line_total(self.quantity, self.unit_price)
    }
}

/// Totals of a purchase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseTotals {
    pub items_total: Decimal,
    pub freight: Decimal,
    pub total: Decimal,
}

pub fn compute_totals(
    lines: &[PricedLine],
    freight: Decimal,
) -> Result<PurchaseTotals, AmountOverflow> {
    let line_totals = lines
        .iter()
        .map(PricedLine::total)
        .collect::<Result<Vec<_>, _>>()?;
    let items_total = sum_amounts(line_totals)?;
    let freight = round_money(freight);
    Ok(PurchaseTotals {
        items_total,
        freight,
        total: sum_amounts([items_total, freight])?,
    })
}

/// Document number written on stock entries received from a purchase order
pub fn purchase_document_number(order_number: i64) -> String {
    format!("PC-{}", order_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_compute_totals() {
        let totals = compute_totals(
            &[
                PricedLine { quantity: 3, unit_price: dec("10.50") },
                PricedLine { quantity: 2, unit_price: dec("4.9975") },
            ],
            dec("15"),
        )
        .unwrap();
        assert_eq!(totals.items_total, dec("41.50"));
        assert_eq!(totals.total, dec("56.50"));
    }

    #[test]
    fn test_empty_order_is_freight_only() {
        let totals = compute_totals(&[], dec("8.00")).unwrap();
        assert_eq!(totals.items_total, Decimal::ZERO);
        assert_eq!(totals.total, dec("8.00"));
    }

    #[test]
    fn test_oversized_price_is_rejected() {
        let line = PricedLine { quantity: 3, unit_price: Decimal::MAX };
        assert_eq!(line.total(), Err(AmountOverflow));
        assert_eq!(compute_totals(&[line], Decimal::ZERO), Err(AmountOverflow));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(
            PurchaseOrderStatus::from_str("delivered"),
            Some(PurchaseOrderStatus::Delivered)
        );
        assert_eq!(purchase_document_number(4), "PC-4");
    }
}
