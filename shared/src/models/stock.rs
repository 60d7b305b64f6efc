//! Consumable stock models and the weighted-average cost arithmetic
//!
//! Every operation that moves quantity goes through [`StockPosition`], so the
//! product's quantity and average cost stay consistent with the movement
//! trail, and every operation has an inverse that restores the prior position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places kept for the weighted-average unit cost
pub const AVERAGE_COST_SCALE: u32 = 10;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received (purchase, manual entry)
    Entry,
    /// Consumables shipped to a rental client
    RentalExit,
    /// Consumables sold
    Sale,
    /// Manual correction removing units
    AdjustmentExit,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "entry",
            MovementType::RentalExit => "rental_exit",
            MovementType::Sale => "sale",
            MovementType::AdjustmentExit => "adjustment_exit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(MovementType::Entry),
            "rental_exit" => Some(MovementType::RentalExit),
            "sale" => Some(MovementType::Sale),
            "adjustment_exit" => Some(MovementType::AdjustmentExit),
            _ => None,
        }
    }

    pub fn is_outflow(&self) -> bool {
        !matches!(self, MovementType::Entry)
    }

    /// All outflow types, as stored
    pub fn outflows() -> [&'static str; 3] {
        [
            MovementType::RentalExit.as_str(),
            MovementType::Sale.as_str(),
            MovementType::AdjustmentExit.as_str(),
        ]
    }
}

/// Lifecycle of a movement record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Active,
    Canceled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Active => "active",
            MovementStatus::Canceled => "canceled",
        }
    }
}

/// Manual adjustment direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Entry,
    Exit,
}

/// Rule violations in stock arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Unit cost must be greater than zero for stock entries")]
    NonPositiveCost,

    #[error("Insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },

    #[error("Quantity overflow")]
    Overflow,

    #[error("Stock value is too large")]
    ValueOverflow,
}

/// Quantity on hand plus its weighted-average unit cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub quantity: i32,
    pub average_cost: Decimal,
}

impl StockPosition {
    pub fn new(quantity: i32, average_cost: Decimal) -> Self {
        Self {
            quantity,
            average_cost,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Decimal::ZERO)
    }

    /// Value of the units on hand at average cost
    pub fn stock_value(&self) -> Decimal {
        value_of(self.quantity, self.average_cost).unwrap_or(Decimal::MAX)
    }

    /// Receive `quantity` units bought at `unit_cost`
    pub fn receive(&self, quantity: i32, unit_cost: Decimal) -> Result<Self, StockError> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if unit_cost <= Decimal::ZERO {
            return Err(StockError::NonPositiveCost);
        }
        let new_quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(StockError::Overflow)?;
        let total = value_of(self.quantity, self.average_cost)?
            .checked_add(value_of(quantity, unit_cost)?)
            .ok_or(StockError::ValueOverflow)?;
        Ok(Self::new(new_quantity, average(total, new_quantity)))
    }

    /// Remove `quantity` units; the average cost is unchanged
    pub fn withdraw(&self, quantity: i32) -> Result<Self, StockError> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if self.quantity < quantity {
            return Err(StockError::Insufficient {
                available: self.quantity,
                requested: quantity,
            });
        }
        Ok(Self::new(self.quantity - quantity, self.average_cost))
    }

    /// Put back units from a canceled outflow
    pub fn restore(&self, quantity: i32) -> Result<Self, StockError> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        let new_quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(StockError::Overflow)?;
        Ok(Self::new(new_quantity, self.average_cost))
    }

    /// Undo an entry of `quantity` units at `unit_cost`.
    ///
    /// `before` is the position the entry was applied to. When nothing has
    /// moved since, that position is returned as is.
    pub fn revert_entry(
        &self,
        quantity: i32,
        unit_cost: Decimal,
        before: Option<StockPosition>,
    ) -> Result<Self, StockError> {
        self.revise_entry(quantity, unit_cost, 0, Decimal::ZERO, before)
    }

    /// Replace a recorded entry (`old_quantity` at `old_cost`) with
    /// `new_quantity` at `new_cost`. A new quantity of zero removes it.
    ///
    /// When `before` is the position the entry was applied to and no other
    /// movement happened since, the result is rebuilt from `before`, so the
    /// prior average comes back without rounding drift. Otherwise the entry's
    /// value is taken out of the current totals.
    pub fn revise_entry(
        &self,
        old_quantity: i32,
        old_cost: Decimal,
        new_quantity: i32,
        new_cost: Decimal,
        before: Option<StockPosition>,
    ) -> Result<Self, StockError> {
        if old_quantity <= 0 || new_quantity < 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if new_quantity > 0 && new_cost <= Decimal::ZERO {
            return Err(StockError::NonPositiveCost);
        }

        if let Some(before) = before {
            if before.receive(old_quantity, old_cost).as_ref() == Ok(self) {
                return if new_quantity == 0 {
                    Ok(before)
                } else {
                    before.receive(new_quantity, new_cost)
                };
            }
        }

        let without_entry = self.quantity - old_quantity;
        let new_total_quantity = without_entry
            .checked_add(new_quantity)
            .ok_or(StockError::Overflow)?;
        if new_total_quantity < 0 || (without_entry < 0 && new_quantity == 0) {
            return Err(StockError::Insufficient {
                available: self.quantity,
                requested: old_quantity - new_quantity,
            });
        }

        let total = value_of(self.quantity, self.average_cost)?
            .checked_sub(value_of(old_quantity, old_cost)?)
            .and_then(|t| t.checked_add(value_of(new_quantity, new_cost).ok()?))
            .ok_or(StockError::ValueOverflow)?;
        Ok(Self::new(new_total_quantity, average(total, new_total_quantity)))
    }
}

fn value_of(quantity: i32, unit_cost: Decimal) -> Result<Decimal, StockError> {
    Decimal::from(quantity)
        .checked_mul(unit_cost)
        .ok_or(StockError::ValueOverflow)
}

fn average(total: Decimal, quantity: i32) -> Decimal {
    if quantity > 0 {
        let avg = (total / Decimal::from(quantity)).round_dp(AVERAGE_COST_SCALE);
        if avg.is_sign_negative() {
            Decimal::ZERO
        } else {
            avg.normalize()
        }
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_receive_into_empty_stock() {
        let pos = StockPosition::empty().receive(10, dec("25.00")).unwrap();
        assert_eq!(pos.quantity, 10);
        assert_eq!(pos.average_cost, dec("25"));
    }

    #[test]
    fn test_receive_weighted_average() {
        // 10 @ 20 + 10 @ 30 = 20 @ 25
        let pos = StockPosition::new(10, dec("20"))
            .receive(10, dec("30"))
            .unwrap();
        assert_eq!(pos, StockPosition::new(20, dec("25")));
    }

    #[test]
    fn test_receive_rejects_zero_cost_and_quantity() {
        let pos = StockPosition::new(5, dec("10"));
        assert_eq!(pos.receive(3, Decimal::ZERO), Err(StockError::NonPositiveCost));
        assert_eq!(pos.receive(0, dec("1")), Err(StockError::NonPositiveQuantity));
    }

    #[test]
    fn test_withdraw_keeps_average() {
        let pos = StockPosition::new(10, dec("12.5")).withdraw(4).unwrap();
        assert_eq!(pos, StockPosition::new(6, dec("12.5")));
    }

    #[test]
    fn test_withdraw_insufficient() {
        let err = StockPosition::new(3, dec("1")).withdraw(4).unwrap_err();
        assert_eq!(
            err,
            StockError::Insufficient {
                available: 3,
                requested: 4
            }
        );
    }

    #[test]
    fn test_withdraw_everything() {
        let pos = StockPosition::new(3, dec("7")).withdraw(3).unwrap();
        assert_eq!(pos.quantity, 0);
    }

    #[test]
    fn test_revert_entry_restores_previous_average() {
        let before = StockPosition::new(10, dec("20"));
        let after = before.receive(10, dec("30")).unwrap();
        let reverted = after.revert_entry(10, dec("30"), None).unwrap();
        assert_eq!(reverted, before);
    }

    #[test]
    fn test_revert_only_entry_zeroes_average() {
        let after = StockPosition::empty().receive(8, dec("9.99")).unwrap();
        assert_eq!(
            after.revert_entry(8, dec("9.99"), None).unwrap(),
            StockPosition::empty()
        );
    }

    #[test]
    fn test_revert_entry_after_units_left() {
        let pos = StockPosition::empty()
            .receive(10, dec("5"))
            .unwrap()
            .withdraw(8)
            .unwrap();
        assert!(matches!(
            pos.revert_entry(10, dec("5"), None),
            Err(StockError::Insufficient { .. })
        ));
    }

    #[test]
    fn test_revise_entry_changes_cost() {
        // 10 @ 20 existing, entry 10 @ 30 corrected to 10 @ 40 → 20 @ 30
        let pos = StockPosition::new(20, dec("25"));
        let revised = pos
            .revise_entry(10, dec("30"), 10, dec("40"), None)
            .unwrap();
        assert_eq!(revised, StockPosition::new(20, dec("30")));
    }

    #[test]
    fn test_revise_entry_changes_quantity() {
        let pos = StockPosition::new(20, dec("25"));
        let revised = pos
            .revise_entry(10, dec("30"), 5, dec("30"), None)
            .unwrap();
        assert_eq!(revised.quantity, 15);
        // (500 - 300 + 150) / 15
        assert_eq!(revised.average_cost, dec("23.3333333333"));
    }

    #[test]
    fn test_revise_entry_below_zero_rejected() {
        let pos = StockPosition::new(2, dec("10"));
        assert!(pos
            .revise_entry(10, dec("10"), 1, dec("10"), None)
            .is_err());
    }

    #[test]
    fn test_revert_entry_from_snapshot_has_no_drift() {
        // 1 @ 1.00 + 2 @ 2.00 averages to 1.6666666667, which recomputing cannot undo
        let before = StockPosition::new(1, dec("1.00"));
        let after = before.receive(2, dec("2.00")).unwrap();
        assert_eq!(after.revert_entry(2, dec("2.00"), Some(before)).unwrap(), before);
    }

    #[test]
    fn test_revise_entry_from_snapshot_rebuilds_on_before() {
        let before = StockPosition::new(1, dec("1.00"));
        let after = before.receive(2, dec("2.00")).unwrap();
        let revised = after
            .revise_entry(2, dec("2.00"), 3, dec("3.00"), Some(before))
            .unwrap();
        assert_eq!(revised, before.receive(3, dec("3.00")).unwrap());
    }

    #[test]
    fn test_stale_snapshot_falls_back_to_totals() {
        let before = StockPosition::new(10, dec("20"));
        let after = before
            .receive(10, dec("30"))
            .unwrap()
            .withdraw(5)
            .unwrap();
        let reverted = after.revert_entry(10, dec("30"), Some(before)).unwrap();
        assert_eq!(reverted.quantity, 5);
    }

    #[test]
    fn test_receive_value_overflow_is_an_error() {
        let pos = StockPosition::new(1, Decimal::MAX);
        assert_eq!(pos.receive(2, Decimal::MAX), Err(StockError::ValueOverflow));
        assert_eq!(
            StockPosition::empty().receive(i32::MAX, Decimal::MAX),
            Err(StockError::ValueOverflow)
        );
    }

    #[test]
    fn test_revise_entry_value_overflow_is_an_error() {
        let pos = StockPosition::new(10, dec("1"));
        assert_eq!(
            pos.revise_entry(1, dec("1"), 5, Decimal::MAX, None),
            Err(StockError::ValueOverflow)
        );
    }

    #[test]
    fn test_stock_value_saturates() {
        assert_eq!(StockPosition::new(2, Decimal::MAX).stock_value(), Decimal::MAX);
    }

    #[test]
    fn test_stock_value() {
        assert_eq!(StockPosition::new(4, dec("2.5")).stock_value(), dec("10"));
    }

    #[test]
    fn test_movement_type_roundtrip_names() {
        for t in [
            MovementType::Entry,
            MovementType::RentalExit,
            MovementType::Sale,
            MovementType::AdjustmentExit,
        ] {
            assert_eq!(MovementType::from_str(t.as_str()), Some(t));
        }
        assert!(!MovementType::Entry.is_outflow());
        assert!(MovementType::Sale.is_outflow());
    }
}
