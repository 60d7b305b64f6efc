//! Printer fleet service: registry, moves between stock, clients and
//! technical assistance, and maintenance work orders

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    plan_move, MovePlan, MoveTarget, PrinterMovementType, PrinterRuleError, PrinterSnapshot,
    PrinterStatus, WorkOrderLogPlan, WorkOrderStatus, STOCK_LOCATION,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;

#[derive(Clone)]
pub struct PrinterService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Printer {
    pub id: Uuid,
    pub brand: Option<String>,
    pub model: String,
    pub serial: String,
    pub mlt: Option<String>,
    pub counter: i64,
    pub status: String,
    pub location: String,
    pub notes: Option<String>,
    pub acquired_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PrinterInput {
    pub brand: Option<String>,
    pub model: String,
    pub serial: String,
    pub mlt: Option<String>,
    pub notes: Option<String>,
    pub acquired_on: Option<NaiveDate>,
    /// Initial page counter; ignored on update
    #[serde(default)]
    pub counter: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrinterFilter {
    pub search: Option<String>,
    pub status: Option<PrinterStatus>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FleetCounts {
    pub total: i64,
    pub available: i64,
    pub rented: i64,
    pub maintenance: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PrinterMovement {
    pub id: Uuid,
    pub printer_id: Uuid,
    pub printer_model: String,
    pub moved_at: DateTime<Utc>,
    pub movement_type: String,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub counter_reading: i64,
    pub user_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PrinterOverview {
    pub printers: Vec<Printer>,
    pub counts: FleetCounts,
    pub recent_movements: Vec<PrinterMovement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Rental,
    Maintenance,
    Stock,
}

#[derive(Debug, Deserialize)]
pub struct MovePrinterInput {
    pub kind: MoveKind,
    pub client_id: Option<Uuid>,
    pub counter: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditMovementInput {
    pub moved_at: DateTime<Utc>,
    pub movement_type: PrinterMovementType,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub counter_reading: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkOrder {
    pub id: Uuid,
    pub printer_id: Uuid,
    pub order_number: i32,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaintenanceLog {
    pub id: Uuid,
    pub work_order_id: Option<Uuid>,
    pub printer_id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub title: String,
    pub notes: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceLogInput {
    pub title: String,
    pub notes: Option<String>,
}

/// One row of a printer's merged timeline
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
    Movement(PrinterMovement),
    Log(MaintenanceLog),
}

impl TimelineEvent {
    fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Movement(m) => m.moved_at,
            TimelineEvent::Log(l) => l.logged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkOrderHistory {
    #[serde(flatten)]
    pub work_order: WorkOrder,
    pub logs: Vec<MaintenanceLog>,
}

#[derive(Debug, Serialize)]
pub struct PrinterHistory {
    pub printer: Printer,
    pub movements: Vec<PrinterMovement>,
    pub work_orders: Vec<WorkOrderHistory>,
}

const PRINTER_COLUMNS: &str =
    "id, brand, model, serial, mlt, counter, status, location, notes, acquired_on, created_at";

const MOVEMENT_SELECT: &str = r#"
    SELECT m.id, m.printer_id, p.model AS printer_model, m.moved_at, m.movement_type,
           m.origin, m.destination, m.counter_reading, m.user_name, m.notes
    FROM printer_movements m
    JOIN printers p ON p.id = m.printer_id
"#;

const LOG_COLUMNS: &str = "id, work_order_id, printer_id, logged_at, title, notes, user_name";

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Merge movements and logs into one newest-first timeline
fn merge_timeline(movements: Vec<PrinterMovement>, logs: Vec<MaintenanceLog>) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = movements
        .into_iter()
        .map(TimelineEvent::Movement)
        .chain(logs.into_iter().map(TimelineEvent::Log))
        .collect();
    events.sort_by(|a, b| b.at().cmp(&a.at()));
    events
}

impl PrinterInput {
    fn check(&self) -> AppResult<()> {
        if self.model.trim().is_empty() {
            return Err(AppError::field("model", "Model is required", "Informe o modelo"));
        }
        if self.serial.trim().is_empty() {
            return Err(AppError::field(
                "serial",
                "Serial number is required",
                "Informe o número de série",
            ));
        }
        if self.counter < 0 {
            return Err(AppError::field(
                "counter",
                "Counter cannot be negative",
                "O contador não pode ser negativo",
            ));
        }
        Ok(())
    }
}

impl PrinterService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_printer(&self, input: PrinterInput, user_name: &str) -> AppResult<Printer> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let printer = sqlx::query_as::<_, Printer>(&format!(
            r#"
            INSERT INTO printers (brand, model, serial, mlt, counter, status, location, notes, acquired_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PRINTER_COLUMNS
        ))
        .bind(clean(input.brand.as_deref()))
        .bind(input.model.trim())
        .bind(input.serial.trim())
        .bind(clean(input.mlt.as_deref()))
        .bind(input.counter)
        .bind(PrinterStatus::Available.as_str())
        .bind(STOCK_LOCATION)
        .bind(clean(input.notes.as_deref()))
        .bind(input.acquired_on)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "serial"))?;

        insert_movement(
            &mut tx,
            printer.id,
            PrinterMovementType::Registration,
            "-",
            STOCK_LOCATION,
            printer.counter,
            None,
            user_name,
        )
        .await?;

        audit::record(
            &mut tx,
            "New printer",
            &format!("{} S/N {}", printer.model, printer.serial),
            user_name,
        )
        .await?;
        tx.commit().await?;
        Ok(printer)
    }

    /// Update registry fields; the counter only moves through readings
    pub async fn update_printer(&self, id: Uuid, input: PrinterInput, user_name: &str) -> AppResult<Printer> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let printer = sqlx::query_as::<_, Printer>(&format!(
            r#"
            UPDATE printers
            SET brand = $2, model = $3, serial = $4, mlt = $5, notes = $6, acquired_on = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRINTER_COLUMNS
        ))
        .bind(id)
        .bind(clean(input.brand.as_deref()))
        .bind(input.model.trim())
        .bind(input.serial.trim())
        .bind(clean(input.mlt.as_deref()))
        .bind(clean(input.notes.as_deref()))
        .bind(input.acquired_on)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "serial"))?
        .ok_or_else(|| AppError::NotFound("Printer".to_string()))?;

        audit::record(
            &mut tx,
            "Printer updated",
            &format!("{} S/N {}", printer.model, printer.serial),
            user_name,
        )
        .await?;
        tx.commit().await?;
        Ok(printer)
    }

    /// Delete a printer and its history, unless a contract still holds it
    pub async fn delete_printer(&self, id: Uuid, user_name: &str) -> AppResult<()> {
        let printer = self.get_printer(id).await?;

        let attached = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM contract_printers WHERE printer_id = $1 AND detached_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        if attached > 0 {
            return Err(AppError::Conflict {
                resource: "printer".to_string(),
                message: "Printer is attached to a contract; detach it first".to_string(),
                message_pt: "Impressora vinculada a um contrato; desvincule antes de excluir"
                    .to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM printers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        audit::record(
            &mut tx,
            "Printer deleted",
            &format!("{} S/N {}", printer.model, printer.serial),
            user_name,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_printer(&self, id: Uuid) -> AppResult<Printer> {
        sqlx::query_as::<_, Printer>(&format!("SELECT {} FROM printers WHERE id = $1", PRINTER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Printer".to_string()))
    }

    /// Filtered fleet list with unfiltered counts and the latest movements
    pub async fn list_printers(&self, filter: &PrinterFilter) -> AppResult<PrinterOverview> {
        let location = match filter.client_id {
            Some(client_id) => Some(
                sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
                    .bind(client_id)
                    .fetch_optional(&self.db)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Client".to_string()))?,
            ),
            None => None,
        };
        let search = clean(filter.search.as_deref()).map(|s| format!("%{}%", s));

        let printers = sqlx::query_as::<_, Printer>(&format!(
            r#"
            SELECT {}
            FROM printers
            WHERE ($1::TEXT IS NULL
                   OR brand ILIKE $1 OR model ILIKE $1 OR serial ILIKE $1
                   OR mlt ILIKE $1 OR location ILIKE $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR location = $3)
            ORDER BY model, serial
            "#,
            PRINTER_COLUMNS
        ))
        .bind(search)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(location)
        .fetch_all(&self.db)
        .await?;

        let counts = sqlx::query_as::<_, FleetCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = $1) AS available,
                   COUNT(*) FILTER (WHERE status = $2) AS rented,
                   COUNT(*) FILTER (WHERE status = $3) AS maintenance
            FROM printers
            "#,
        )
        .bind(PrinterStatus::Available.as_str())
        .bind(PrinterStatus::Rented.as_str())
        .bind(PrinterStatus::Maintenance.as_str())
        .fetch_one(&self.db)
        .await?;

        let recent_movements = sqlx::query_as::<_, PrinterMovement>(&format!(
            "{} ORDER BY m.moved_at DESC LIMIT 20",
            MOVEMENT_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(PrinterOverview {
            printers,
            counts,
            recent_movements,
        })
    }

    /// Send a printer to a client, to technical assistance or back to stock
    pub async fn move_printer(&self, id: Uuid, input: MovePrinterInput, user_name: &str) -> AppResult<Printer> {
        let notes = clean(input.notes.as_deref()).unwrap_or("");

        let mut tx = self.db.begin().await?;
        let printer = sqlx::query_as::<_, Printer>(&format!(
            "SELECT {} FROM printers WHERE id = $1 FOR UPDATE",
            PRINTER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Printer".to_string()))?;

        let open_order = open_work_order(&mut tx, id).await?;

        let target = match input.kind {
            MoveKind::Rental => {
                let client_id = input.client_id.ok_or(PrinterRuleError::ClientRequired)?;
                let client_name =
                    sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
                        .bind(client_id)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Client".to_string()))?;
                MoveTarget::Rental { client_name }
            }
            MoveKind::Maintenance => MoveTarget::Maintenance,
            MoveKind::Stock => MoveTarget::Stock,
        };

        let snapshot = PrinterSnapshot {
            status: PrinterStatus::from_str(&printer.status).unwrap_or(PrinterStatus::Available),
            location: printer.location.clone(),
            counter: printer.counter,
            has_open_work_order: open_order.is_some(),
        };
        let plan = plan_move(&snapshot, &target, input.counter, notes)?;

        self.apply_plan(&mut tx, &printer, open_order, &plan, notes, user_name)
            .await?;

        audit::record(
            &mut tx,
            "Printer moved",
            &format!(
                "{} S/N {}: {} -> {}",
                printer.model, printer.serial, plan.origin, plan.destination
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_printer(id).await
    }

    async fn apply_plan(
        &self,
        conn: &mut PgConnection,
        printer: &Printer,
        open_order: Option<Uuid>,
        plan: &MovePlan,
        notes: &str,
        user_name: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE printers
            SET status = $2, location = $3, counter = GREATEST(counter, $4), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(printer.id)
        .bind(plan.status.as_str())
        .bind(&plan.destination)
        .bind(plan.counter)
        .execute(&mut *conn)
        .await?;

        insert_movement(
            &mut *conn,
            printer.id,
            plan.movement_type,
            &plan.origin,
            &plan.destination,
            plan.counter,
            Some(notes).filter(|n| !n.is_empty()),
            user_name,
        )
        .await?;

        if let (Some(log), Some(work_order_id)) = (&plan.close_work_order, open_order) {
            sqlx::query("UPDATE work_orders SET status = $2, closed_at = NOW() WHERE id = $1")
                .bind(work_order_id)
                .bind(WorkOrderStatus::Finished.as_str())
                .execute(&mut *conn)
                .await?;
            insert_log(&mut *conn, printer.id, Some(work_order_id), log, user_name).await?;
        }

        if let Some((reason, log)) = &plan.open_work_order {
            let work_order_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO work_orders (printer_id, order_number, status, reason)
                VALUES (
                    $1,
                    (SELECT COUNT(*) + 1 FROM work_orders WHERE printer_id = $1),
                    $2,
                    $3
                )
                RETURNING id
                "#,
            )
            .bind(printer.id)
            .bind(WorkOrderStatus::Open.as_str())
            .bind(clean(Some(reason.as_str())))
            .fetch_one(&mut *conn)
            .await?;
            insert_log(&mut *conn, printer.id, Some(work_order_id), log, user_name).await?;
        }

        Ok(())
    }

    pub async fn edit_movement(
        &self,
        movement_id: Uuid,
        input: EditMovementInput,
        user_name: &str,
    ) -> AppResult<PrinterMovement> {
        if input.counter_reading < 0 {
            return Err(AppError::field(
                "counter_reading",
                "Counter cannot be negative",
                "O contador não pode ser negativo",
            ));
        }

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE printer_movements
            SET moved_at = $2, movement_type = $3, origin = $4, destination = $5,
                counter_reading = $6, notes = $7
            WHERE id = $1
            "#,
        )
        .bind(movement_id)
        .bind(input.moved_at)
        .bind(input.movement_type.as_str())
        .bind(clean(input.origin.as_deref()))
        .bind(clean(input.destination.as_deref()))
        .bind(input.counter_reading)
        .bind(clean(input.notes.as_deref()))
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Printer movement".to_string()));
        }

        audit::record(
            &mut tx,
            "Printer movement edited",
            &movement_id.to_string(),
            user_name,
        )
        .await?;
        tx.commit().await?;

        sqlx::query_as::<_, PrinterMovement>(&format!("{} WHERE m.id = $1", MOVEMENT_SELECT))
            .bind(movement_id)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::from)
    }

    /// Work orders of a printer, newest number first
    pub async fn list_work_orders(&self, printer_id: Uuid) -> AppResult<Vec<WorkOrder>> {
        self.get_printer(printer_id).await?;
        let orders = sqlx::query_as::<_, WorkOrder>(
            r#"
            SELECT id, printer_id, order_number, opened_at, closed_at, status, reason
            FROM work_orders
            WHERE printer_id = $1
            ORDER BY order_number DESC
            "#,
        )
        .bind(printer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(orders)
    }

    pub async fn add_maintenance_log(
        &self,
        work_order_id: Uuid,
        input: MaintenanceLogInput,
        user_name: &str,
    ) -> AppResult<MaintenanceLog> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::field("title", "Title is required", "Informe o título"));
        }

        let mut tx = self.db.begin().await?;
        let printer_id = sqlx::query_scalar::<_, Uuid>("SELECT printer_id FROM work_orders WHERE id = $1")
            .bind(work_order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Work order".to_string()))?;

        let log = WorkOrderLogPlan {
            title: title.to_string(),
            notes: input.notes.unwrap_or_default().trim().to_string(),
        };
        let id = insert_log(&mut tx, printer_id, Some(work_order_id), &log, user_name).await?;
        tx.commit().await?;

        let log = sqlx::query_as::<_, MaintenanceLog>(&format!(
            "SELECT {} FROM maintenance_logs WHERE id = $1",
            LOG_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(log)
    }

    /// Movements and maintenance logs merged, newest first
    pub async fn timeline(&self, printer_id: Uuid) -> AppResult<Vec<TimelineEvent>> {
        self.get_printer(printer_id).await?;
        let movements = self.movements(printer_id).await?;
        let logs = sqlx::query_as::<_, MaintenanceLog>(&format!(
            "SELECT {} FROM maintenance_logs WHERE printer_id = $1",
            LOG_COLUMNS
        ))
        .bind(printer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(merge_timeline(movements, logs))
    }

    /// Movements plus every work order with its logs
    pub async fn full_history(&self, printer_id: Uuid) -> AppResult<PrinterHistory> {
        let printer = self.get_printer(printer_id).await?;
        let movements = self.movements(printer_id).await?;
        let orders = self.list_work_orders(printer_id).await?;

        let logs = sqlx::query_as::<_, MaintenanceLog>(&format!(
            r#"
            SELECT {}
            FROM maintenance_logs
            WHERE printer_id = $1 AND work_order_id IS NOT NULL
            ORDER BY logged_at
            "#,
            LOG_COLUMNS
        ))
        .bind(printer_id)
        .fetch_all(&self.db)
        .await?;

        let work_orders = orders
            .into_iter()
            .map(|work_order| {
                let own = logs
                    .iter()
                    .filter(|l| l.work_order_id == Some(work_order.id))
                    .cloned()
                    .collect();
                WorkOrderHistory {
                    work_order,
                    logs: own,
                }
            })
            .collect();

        Ok(PrinterHistory {
            printer,
            movements,
            work_orders,
        })
    }

    async fn movements(&self, printer_id: Uuid) -> AppResult<Vec<PrinterMovement>> {
        let movements = sqlx::query_as::<_, PrinterMovement>(&format!(
            "{} WHERE m.printer_id = $1 ORDER BY m.moved_at DESC",
            MOVEMENT_SELECT
        ))
        .bind(printer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(movements)
    }
}

async fn open_work_order(conn: &mut PgConnection, printer_id: Uuid) -> AppResult<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM work_orders WHERE printer_id = $1 AND status = $2 FOR UPDATE",
    )
    .bind(printer_id)
    .bind(WorkOrderStatus::Open.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
async fn insert_movement(
    conn: &mut PgConnection,
    printer_id: Uuid,
    movement_type: PrinterMovementType,
    origin: &str,
    destination: &str,
    counter: i64,
    notes: Option<&str>,
    user_name: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO printer_movements (
            printer_id, movement_type, origin, destination, counter_reading, user_name, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(printer_id)
    .bind(movement_type.as_str())
    .bind(origin)
    .bind(destination)
    .bind(counter)
    .bind(user_name)
    .bind(notes)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_log(
    conn: &mut PgConnection,
    printer_id: Uuid,
    work_order_id: Option<Uuid>,
    log: &WorkOrderLogPlan,
    user_name: &str,
) -> AppResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO maintenance_logs (work_order_id, printer_id, title, notes, user_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(work_order_id)
    .bind(printer_id)
    .bind(&log.title)
    .bind(Some(log.notes.as_str()).filter(|n| !n.is_empty()))
    .bind(user_name)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn movement(at: DateTime<Utc>) -> PrinterMovement {
        PrinterMovement {
            id: Uuid::new_v4(),
            printer_id: Uuid::nil(),
            printer_model: "M404".to_string(),
            moved_at: at,
            movement_type: "rental".to_string(),
            origin: Some("Stock".to_string()),
            destination: Some("Acme".to_string()),
            counter_reading: 100,
            user_name: None,
            notes: None,
        }
    }

    fn log(at: DateTime<Utc>) -> MaintenanceLog {
        MaintenanceLog {
            id: Uuid::new_v4(),
            work_order_id: None,
            printer_id: Uuid::nil(),
            logged_at: at,
            title: "Ticket opened".to_string(),
            notes: None,
            user_name: None,
        }
    }

    #[test]
    fn test_timeline_is_newest_first() {
        let t = |d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let events = merge_timeline(vec![movement(t(1)), movement(t(5))], vec![log(t(3))]);
        let days: Vec<_> = events.iter().map(|e| e.at()).collect();
        assert_eq!(days, vec![t(5), t(3), t(1)]);
        assert!(matches!(events[1], TimelineEvent::Log(_)));
    }

    #[test]
    fn test_input_requires_model_and_serial() {
        let mut input = PrinterInput {
            brand: Some("HP".to_string()),
            model: "M404".to_string(),
            serial: "BR123".to_string(),
            mlt: None,
            notes: None,
            acquired_on: None,
            counter: 0,
        };
        assert!(input.check().is_ok());
        input.serial = " ".to_string();
        assert!(input.check().is_err());
        input.serial = "BR123".to_string();
        input.model = String::new();
        assert!(input.check().is_err());
    }

    #[test]
    fn test_move_input_parses_kind() {
        let input: MovePrinterInput =
            serde_json::from_str(r#"{"kind": "maintenance", "counter": 1500, "notes": "Jam"}"#).unwrap();
        assert_eq!(input.kind, MoveKind::Maintenance);
        assert!(input.client_id.is_none());
    }
}
