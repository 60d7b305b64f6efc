//! Rental order models (consumables shipped to rental clients)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One requested line of a stock-moving document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Total quantity requested per product, so a product listed twice is
/// checked against its stock once. Ordered by product id, which is also
/// the order rows are locked in.
pub fn aggregate_quantities(items: &[ItemQuantity]) -> BTreeMap<Uuid, i64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_id).or_insert(0i64) += i64::from(item.quantity);
    }
    totals
}

/// Movement note for a rental order line
pub fn rental_order_note(order_number: i64, printer_label: Option<&str>) -> String {
    format!("Order #{} - {}", order_number, printer_label.unwrap_or("").trim())
}

/// Movement note for lines rewritten by an order edit
pub fn rental_order_edit_note(order_number: i64) -> String {
    format!("Order #{} edit", order_number)
}

/// Suffix appended to the notes of a canceled movement
pub fn canceled_note(notes: Option<&str>, reason: Option<&str>) -> String {
    let base = notes.unwrap_or("");
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{} [CANCELED: {}]", base, reason).trim_start().to_string(),
        None => format!("{} [CANCELED]", base).trim_start().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_merges_repeated_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals = aggregate_quantities(&[
            ItemQuantity { product_id: a, quantity: 2 },
            ItemQuantity { product_id: b, quantity: 1 },
            ItemQuantity { product_id: a, quantity: 3 },
        ]);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], 5);
        assert_eq!(totals[&b], 1);
    }

    #[test]
    fn test_notes() {
        assert_eq!(rental_order_note(7, Some("HP M428")), "Order #7 - HP M428");
        assert_eq!(rental_order_edit_note(7), "Order #7 edit");
        assert_eq!(canceled_note(Some("Sale #3"), None), "Sale #3 [CANCELED]");
        assert_eq!(
            canceled_note(Some("Order #7 - X"), Some("client gave up")),
            "Order #7 - X [CANCELED: client gave up]"
        );
        assert_eq!(canceled_note(None, None), "[CANCELED]");
    }
}
