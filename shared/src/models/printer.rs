//! Printer fleet models and the move-planning rule
//!
//! A move decides the new status and location of a printer and whether a
//! maintenance work order is opened or closed alongside it. The backend
//! applies the resulting [`MovePlan`] inside one transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of printers sitting in the warehouse
pub const STOCK_LOCATION: &str = "Stock";

/// Location of printers under repair
pub const TECHNICAL_ASSISTANCE_LOCATION: &str = "Technical assistance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Available,
    Rented,
    Maintenance,
}

impl PrinterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterStatus::Available => "available",
            PrinterStatus::Rented => "rented",
            PrinterStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(PrinterStatus::Available),
            "rented" => Some(PrinterStatus::Rented),
            "maintenance" => Some(PrinterStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterMovementType {
    Registration,
    Rental,
    Maintenance,
    Stock,
}

impl PrinterMovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterMovementType::Registration => "registration",
            PrinterMovementType::Rental => "rental",
            PrinterMovementType::Maintenance => "maintenance",
            PrinterMovementType::Stock => "stock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(PrinterMovementType::Registration),
            "rental" => Some(PrinterMovementType::Rental),
            "maintenance" => Some(PrinterMovementType::Maintenance),
            "stock" => Some(PrinterMovementType::Stock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    Finished,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::Finished => "finished",
        }
    }
}

/// Where a printer is being sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    Rental { client_name: String },
    Maintenance,
    Stock,
}

/// The part of a printer's state a move depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterSnapshot {
    pub status: PrinterStatus,
    pub location: String,
    pub counter: i64,
    pub has_open_work_order: bool,
}

/// Log entry written on a work order as part of a move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrderLogPlan {
    pub title: String,
    pub notes: String,
}

/// Outcome of a move, to be persisted as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub movement_type: PrinterMovementType,
    pub status: PrinterStatus,
    pub origin: String,
    pub destination: String,
    pub counter: i64,
    /// Reason for a new work order and its opening log
    pub open_work_order: Option<(String, WorkOrderLogPlan)>,
    /// Closing log for the currently open work order
    pub close_work_order: Option<WorkOrderLogPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrinterRuleError {
    #[error("Counter {given} is lower than the current counter {current}")]
    CounterDecreased { current: i64, given: i64 },

    #[error("Printer already has an open work order")]
    WorkOrderAlreadyOpen,

    #[error("A client is required to rent a printer")]
    ClientRequired,
}

/// Plan a move of a printer to `target` with the new counter reading
pub fn plan_move(
    printer: &PrinterSnapshot,
    target: &MoveTarget,
    counter: i64,
    notes: &str,
) -> Result<MovePlan, PrinterRuleError> {
    if counter < printer.counter {
        return Err(PrinterRuleError::CounterDecreased {
            current: printer.counter,
            given: counter,
        });
    }

    let (movement_type, status, destination) = match target {
        MoveTarget::Rental { client_name } => {
            let name = client_name.trim();
            if name.is_empty() {
                return Err(PrinterRuleError::ClientRequired);
            }
            (PrinterMovementType::Rental, PrinterStatus::Rented, name.to_string())
        }
        MoveTarget::Maintenance => {
            if printer.has_open_work_order {
                return Err(PrinterRuleError::WorkOrderAlreadyOpen);
            }
            (
                PrinterMovementType::Maintenance,
                PrinterStatus::Maintenance,
                TECHNICAL_ASSISTANCE_LOCATION.to_string(),
            )
        }
        MoveTarget::Stock => (
            PrinterMovementType::Stock,
            PrinterStatus::Available,
            STOCK_LOCATION.to_string(),
        ),
    };

    let open_work_order = match target {
        MoveTarget::Maintenance => Some((
            notes.to_string(),
            WorkOrderLogPlan {
                title: "Ticket opened".to_string(),
                notes: format!("Reason: {}", notes),
            },
        )),
        _ => None,
    };

    let close_work_order = match target {
        MoveTarget::Maintenance => None,
        _ if !printer.has_open_work_order => None,
        MoveTarget::Rental { .. } => Some(WorkOrderLogPlan {
            title: "Finished".to_string(),
            notes: format!("Equipment sent to client {}.", destination),
        }),
        MoveTarget::Stock => Some(WorkOrderLogPlan {
            title: "Finished".to_string(),
            notes: "Equipment returned to stock.".to_string(),
        }),
    };

    Ok(MovePlan {
        movement_type,
        status,
        origin: printer.location.clone(),
        destination,
        counter,
        open_work_order,
        close_work_order,
    })
}

/// Label shown when picking one of a client's rented printers
pub fn rented_printer_label(model: &str, serial: Option<&str>, mlt: Option<&str>) -> String {
    let or_placeholder = |v: Option<&str>, placeholder: &'static str| -> String {
        match v.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => placeholder.to_string(),
        }
    };
    format!(
        "{} | S/N: {} | MLT: {}",
        model,
        or_placeholder(serial, "-"),
        or_placeholder(mlt, "S/M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_stock(counter: i64) -> PrinterSnapshot {
        PrinterSnapshot {
            status: PrinterStatus::Available,
            location: STOCK_LOCATION.to_string(),
            counter,
            has_open_work_order: false,
        }
    }

    #[test]
    fn test_counter_cannot_decrease() {
        let err = plan_move(&in_stock(500), &MoveTarget::Stock, 499, "").unwrap_err();
        assert_eq!(
            err,
            PrinterRuleError::CounterDecreased {
                current: 500,
                given: 499
            }
        );
    }

    #[test]
    fn test_rental_sets_client_location() {
        let plan = plan_move(
            &in_stock(100),
            &MoveTarget::Rental {
                client_name: "Acme Ltda".into(),
            },
            150,
            "delivery",
        )
        .unwrap();
        assert_eq!(plan.status, PrinterStatus::Rented);
        assert_eq!(plan.destination, "Acme Ltda");
        assert_eq!(plan.origin, STOCK_LOCATION);
        assert_eq!(plan.counter, 150);
        assert!(plan.open_work_order.is_none());
        assert!(plan.close_work_order.is_none());
    }

    #[test]
    fn test_rental_requires_client() {
        let err = plan_move(
            &in_stock(0),
            &MoveTarget::Rental {
                client_name: "  ".into(),
            },
            0,
            "",
        )
        .unwrap_err();
        assert_eq!(err, PrinterRuleError::ClientRequired);
    }

    #[test]
    fn test_maintenance_opens_work_order() {
        let plan = plan_move(&in_stock(10), &MoveTarget::Maintenance, 10, "paper jam").unwrap();
        assert_eq!(plan.status, PrinterStatus::Maintenance);
        assert_eq!(plan.destination, TECHNICAL_ASSISTANCE_LOCATION);
        let (reason, log) = plan.open_work_order.unwrap();
        assert_eq!(reason, "paper jam");
        assert_eq!(log.title, "Ticket opened");
        assert_eq!(log.notes, "Reason: paper jam");
    }

    #[test]
    fn test_maintenance_refused_when_order_open() {
        let mut printer = in_stock(10);
        printer.has_open_work_order = true;
        assert_eq!(
            plan_move(&printer, &MoveTarget::Maintenance, 10, "again").unwrap_err(),
            PrinterRuleError::WorkOrderAlreadyOpen
        );
    }

    #[test]
    fn test_leaving_maintenance_closes_order() {
        let printer = PrinterSnapshot {
            status: PrinterStatus::Maintenance,
            location: TECHNICAL_ASSISTANCE_LOCATION.to_string(),
            counter: 10,
            has_open_work_order: true,
        };
        let plan = plan_move(&printer, &MoveTarget::Stock, 12, "").unwrap();
        assert_eq!(plan.status, PrinterStatus::Available);
        assert_eq!(plan.origin, TECHNICAL_ASSISTANCE_LOCATION);
        let log = plan.close_work_order.unwrap();
        assert_eq!(log.title, "Finished");
        assert_eq!(log.notes, "Equipment returned to stock.");

        let plan = plan_move(
            &printer,
            &MoveTarget::Rental {
                client_name: "Beta".into(),
            },
            12,
            "",
        )
        .unwrap();
        assert_eq!(
            plan.close_work_order.unwrap().notes,
            "Equipment sent to client Beta."
        );
    }

    #[test]
    fn test_rented_printer_label() {
        assert_eq!(
            rented_printer_label("M428", Some("BR123"), None),
            "M428 | S/N: BR123 | MLT: S/M"
        );
        assert_eq!(
            rented_printer_label("M428", Some("BR123"), Some("MLT-9")),
            "M428 | S/N: BR123 | MLT: MLT-9"
        );
    }
}
