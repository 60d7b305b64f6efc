//! Printer move planning tests

use proptest::prelude::*;

use shared::{
    plan_move, rented_printer_label, MoveTarget, PrinterMovementType, PrinterRuleError,
    PrinterSnapshot, PrinterStatus, STOCK_LOCATION, TECHNICAL_ASSISTANCE_LOCATION,
};

fn in_stock(counter: i64) -> PrinterSnapshot {
    PrinterSnapshot {
        status: PrinterStatus::Available,
        location: STOCK_LOCATION.to_string(),
        counter,
        has_open_work_order: false,
    }
}

fn in_maintenance(counter: i64) -> PrinterSnapshot {
    PrinterSnapshot {
        status: PrinterStatus::Maintenance,
        location: TECHNICAL_ASSISTANCE_LOCATION.to_string(),
        counter,
        has_open_work_order: true,
    }
}

fn target_strategy() -> impl Strategy<Value = MoveTarget> {
    prop_oneof![
        "[A-Z][a-z]{2,12}".prop_map(|client_name| MoveTarget::Rental { client_name }),
        Just(MoveTarget::Stock),
        Just(MoveTarget::Maintenance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The page counter never goes backwards
    #[test]
    fn prop_counter_cannot_decrease(
        current in 0i64..1_000_000,
        delta in 1i64..10_000,
        target in target_strategy(),
    ) {
        let result = plan_move(&in_stock(current), &target, current - delta, "");
        prop_assert_eq!(
            result,
            Err(PrinterRuleError::CounterDecreased { current, given: current - delta })
        );
    }

    /// Every accepted move starts where the printer currently is
    #[test]
    fn prop_origin_is_current_location(
        current in 0i64..1_000_000,
        advance in 0i64..10_000,
        target in target_strategy(),
    ) {
        let plan = plan_move(&in_stock(current), &target, current + advance, "jam").unwrap();
        prop_assert_eq!(plan.origin, STOCK_LOCATION.to_string());
        prop_assert_eq!(plan.counter, current + advance);
    }
}

#[test]
fn test_rent_from_stock() {
    let plan = plan_move(
        &in_stock(1000),
        &MoveTarget::Rental {
            client_name: " Acme Ltda ".to_string(),
        },
        1200,
        "",
    )
    .unwrap();
    assert_eq!(plan.movement_type, PrinterMovementType::Rental);
    assert_eq!(plan.status, PrinterStatus::Rented);
    assert_eq!(plan.destination, "Acme Ltda");
    assert!(plan.open_work_order.is_none());
    assert!(plan.close_work_order.is_none());
}

#[test]
fn test_rent_requires_client() {
    let result = plan_move(
        &in_stock(0),
        &MoveTarget::Rental {
            client_name: "  ".to_string(),
        },
        0,
        "",
    );
    assert_eq!(result, Err(PrinterRuleError::ClientRequired));
}

#[test]
fn test_maintenance_opens_work_order() {
    let plan = plan_move(&in_stock(500), &MoveTarget::Maintenance, 500, "Paper jam").unwrap();
    assert_eq!(plan.status, PrinterStatus::Maintenance);
    assert_eq!(plan.destination, TECHNICAL_ASSISTANCE_LOCATION);
    let (reason, log) = plan.open_work_order.unwrap();
    assert_eq!(reason, "Paper jam");
    assert_eq!(log.title, "Ticket opened");
    assert_eq!(log.notes, "Reason: Paper jam");
}

#[test]
fn test_second_maintenance_rejected() {
    let result = plan_move(&in_maintenance(500), &MoveTarget::Maintenance, 500, "again");
    assert_eq!(result, Err(PrinterRuleError::WorkOrderAlreadyOpen));
}

#[test]
fn test_leaving_maintenance_closes_work_order() {
    let to_stock = plan_move(&in_maintenance(500), &MoveTarget::Stock, 510, "").unwrap();
    assert_eq!(to_stock.status, PrinterStatus::Available);
    assert_eq!(to_stock.origin, TECHNICAL_ASSISTANCE_LOCATION);
    assert_eq!(
        to_stock.close_work_order.unwrap().notes,
        "Equipment returned to stock."
    );

    let to_client = plan_move(
        &in_maintenance(500),
        &MoveTarget::Rental {
            client_name: "Acme".to_string(),
        },
        510,
        "",
    )
    .unwrap();
    assert_eq!(
        to_client.close_work_order.unwrap().notes,
        "Equipment sent to client Acme."
    );
}

#[test]
fn test_rented_printer_label_placeholders() {
    assert_eq!(
        rented_printer_label("M404", Some("BR123"), Some("77")),
        "M404 | S/N: BR123 | MLT: 77"
    );
    assert_eq!(
        rented_printer_label("M404", None, Some(" ")),
        "M404 | S/N: - | MLT: S/M"
    );
}
