//! Rental contracts: attached printers, monthly franchise billing and
//! per-contract profitability
//!
//! The baseline of a printer is the current counter of its latest issued
//! billing line since it was attached, falling back to the start counter.
//! Voiding the latest billing therefore restores the previous baselines
//! without touching printer counters.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    billing_due_date, compute_billing, deserialize_money, format_brl, validate_billing_day,
    BillingStatus, BillingTerms, ContractStatus, EntryKind, EntrySource, MonthPeriod,
    MovementStatus, MovementType, PrinterReading,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::finance::{self, NewLedgerEntry};

#[derive(Clone)]
pub struct ContractService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub contract_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub monthly_fee: Decimal,
    pub franchise_pages: i64,
    pub overage_price: Decimal,
    pub billing_day: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    fn terms(&self) -> BillingTerms {
        BillingTerms {
            monthly_fee: self.monthly_fee,
            franchise_pages: self.franchise_pages,
            overage_price: self.overage_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContractInput {
    pub contract_number: String,
    pub client_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_money")]
    pub monthly_fee: Decimal,
    #[serde(default)]
    pub franchise_pages: i64,
    #[serde(deserialize_with = "deserialize_money")]
    pub overage_price: Decimal,
    pub billing_day: i32,
    pub status: Option<ContractStatus>,
    pub notes: Option<String>,
}

impl ContractInput {
    fn check(&self) -> AppResult<()> {
        if self.contract_number.trim().is_empty() {
            return Err(AppError::field(
                "contract_number",
                "Contract number is required",
                "Informe o número do contrato",
            ));
        }
        if let Some(ends_on) = self.ends_on {
            if ends_on < self.starts_on {
                return Err(AppError::field(
                    "ends_on",
                    "End date is before the start date",
                    "A data final é anterior à inicial",
                ));
            }
        }
        BillingTerms {
            monthly_fee: self.monthly_fee,
            franchise_pages: self.franchise_pages,
            overage_price: self.overage_price,
        }
        .validate()?;
        validate_billing_day(self.billing_day)?;
        Ok(())
    }
}

/// A printer attached to a contract with its billing baseline
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttachedPrinter {
    pub printer_id: Uuid,
    pub model: String,
    pub serial: String,
    pub counter: i64,
    pub start_counter: i64,
    pub baseline: i64,
    pub attached_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: Contract,
    pub printers: Vec<AttachedPrinter>,
}

#[derive(Debug, Deserialize)]
pub struct AttachPrinterInput {
    pub printer_id: Uuid,
    pub start_counter: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CounterReadingInput {
    pub printer_id: Uuid,
    pub counter: i64,
}

#[derive(Debug, Deserialize)]
pub struct IssueBillingInput {
    pub year: i32,
    pub month: u32,
    pub readings: Vec<CounterReadingInput>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContractBilling {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub period_year: i32,
    pub period_month: i32,
    pub pages: i64,
    pub excess_pages: i64,
    pub monthly_fee: Decimal,
    pub overage_amount: Decimal,
    pub total: Decimal,
    pub status: String,
    pub ledger_entry_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContractBillingLine {
    pub id: Uuid,
    pub printer_id: Option<Uuid>,
    pub printer_model: Option<String>,
    pub previous_counter: i64,
    pub current_counter: i64,
    pub pages: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BillingDetail {
    #[serde(flatten)]
    pub billing: ContractBilling,
    pub lines: Vec<ContractBillingLine>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize)]
pub struct Profitability {
    pub contract_id: Uuid,
    pub period: String,
    pub revenue: Decimal,
    pub consumables_cost: Decimal,
    pub margin: Decimal,
}

#[derive(Debug, FromRow)]
struct BillingLock {
    id: Uuid,
    contract_id: Uuid,
    period_year: i32,
    period_month: i32,
    status: String,
}

const CONTRACT_SELECT: &str = r#"
    SELECT k.id, k.contract_number, k.client_id, c.name AS client_name, k.starts_on, k.ends_on,
           k.monthly_fee, k.franchise_pages, k.overage_price, k.billing_day, k.status, k.notes,
           k.created_at
    FROM contracts k
    JOIN clients c ON c.id = k.client_id
"#;

const BILLING_COLUMNS: &str = r#"
    id, contract_id, period_year, period_month, pages, excess_pages, monthly_fee,
    overage_amount, total, status, ledger_entry_id, issued_at, voided_at
"#;

fn period_of(year: i32, month: u32) -> AppResult<MonthPeriod> {
    MonthPeriod::new(year, month)
        .ok_or_else(|| AppError::field("month", "Month must be between 1 and 12", "Mês inválido"))
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pair each attached printer with its reading, rejecting missing or foreign readings
fn match_readings(
    attached: &[AttachedPrinter],
    readings: &[CounterReadingInput],
) -> AppResult<Vec<PrinterReading>> {
    if let Some(foreign) = readings
        .iter()
        .find(|r| !attached.iter().any(|p| p.printer_id == r.printer_id))
    {
        return Err(AppError::field(
            "readings",
            &format!("Printer {} is not attached to this contract", foreign.printer_id),
            "Impressora não vinculada a este contrato",
        ));
    }

    attached
        .iter()
        .map(|p| {
            let reading = readings
                .iter()
                .find(|r| r.printer_id == p.printer_id)
                .ok_or_else(|| {
                    AppError::field(
                        "readings",
                        &format!("Missing reading for printer {} ({})", p.model, p.serial),
                        "Informe a leitura de todas as impressoras",
                    )
                })?;
            Ok(PrinterReading {
                printer_id: p.printer_id,
                previous_counter: p.baseline,
                current_counter: reading.counter,
            })
        })
        .collect()
}

impl ContractService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: ContractInput, user_name: &str) -> AppResult<ContractDetail> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO contracts (
                contract_number, client_id, starts_on, ends_on, monthly_fee, franchise_pages,
                overage_price, billing_day, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(input.contract_number.trim())
        .bind(input.client_id)
        .bind(input.starts_on)
        .bind(input.ends_on)
        .bind(input.monthly_fee)
        .bind(input.franchise_pages)
        .bind(input.overage_price)
        .bind(input.billing_day)
        .bind(input.status.unwrap_or(ContractStatus::Active).as_str())
        .bind(clean(input.notes.as_deref()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "contract_number"))?;

        audit::record(
            &mut tx,
            "New contract",
            &format!("{} ({}/month)", input.contract_number.trim(), format_brl(input.monthly_fee)),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ContractDetail> {
        let contract = sqlx::query_as::<_, Contract>(&format!("{} WHERE k.id = $1", CONTRACT_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Contract".to_string()))?;
        let mut conn = self.db.acquire().await?;
        let printers = attached_printers(&mut conn, id).await?;
        Ok(ContractDetail { contract, printers })
    }

    pub async fn list(&self, status: Option<ContractStatus>) -> AppResult<Vec<Contract>> {
        let contracts = sqlx::query_as::<_, Contract>(&format!(
            "{} WHERE ($1::TEXT IS NULL OR k.status = $1) ORDER BY k.contract_number",
            CONTRACT_SELECT
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(contracts)
    }

    /// Update terms and status; terminated contracts keep their billings
    pub async fn update(&self, id: Uuid, input: ContractInput, user_name: &str) -> AppResult<ContractDetail> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE contracts
            SET contract_number = $2, client_id = $3, starts_on = $4, ends_on = $5,
                monthly_fee = $6, franchise_pages = $7, overage_price = $8, billing_day = $9,
                status = COALESCE($10, status), notes = $11, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.contract_number.trim())
        .bind(input.client_id)
        .bind(input.starts_on)
        .bind(input.ends_on)
        .bind(input.monthly_fee)
        .bind(input.franchise_pages)
        .bind(input.overage_price)
        .bind(input.billing_day)
        .bind(input.status.map(|s| s.as_str()))
        .bind(clean(input.notes.as_deref()))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "contract_number"))?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Contract".to_string()));
        }

        if input.status == Some(ContractStatus::Terminated) {
            sqlx::query(
                "UPDATE contract_printers SET detached_at = NOW() WHERE contract_id = $1 AND detached_at IS NULL",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(&mut tx, "Contract updated", input.contract_number.trim(), user_name).await?;
        tx.commit().await?;

        self.get(id).await
    }

    pub async fn attach_printer(
        &self,
        id: Uuid,
        input: AttachPrinterInput,
        user_name: &str,
    ) -> AppResult<ContractDetail> {
        let mut tx = self.db.begin().await?;
        let contract = lock_contract(&mut tx, id).await?;
        if contract.status == ContractStatus::Terminated.as_str() {
            return Err(AppError::BusinessRule(
                "Printers cannot be attached to a terminated contract".to_string(),
            ));
        }

        let (model, serial, counter) = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT model, serial, counter FROM printers WHERE id = $1 FOR UPDATE",
        )
        .bind(input.printer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Printer".to_string()))?;

        let start_counter = input.start_counter.unwrap_or(counter);
        if start_counter < 0 {
            return Err(AppError::field(
                "start_counter",
                "Counter cannot be negative",
                "O contador não pode ser negativo",
            ));
        }

        sqlx::query(
            "INSERT INTO contract_printers (contract_id, printer_id, start_counter) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(input.printer_id)
        .bind(start_counter)
        .execute(&mut *tx)
        .await
        .map_err(|e| match AppError::from_unique(e, "printer_id") {
            AppError::DuplicateEntry(_) => AppError::Conflict {
                resource: "printer".to_string(),
                message: format!("{} S/N {} already belongs to a contract", model, serial),
                message_pt: "Impressora já vinculada a um contrato".to_string(),
            },
            other => other,
        })?;

        audit::record(
            &mut tx,
            "Printer attached to contract",
            &format!("{} S/N {} -> {}", model, serial, contract.contract_number),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get(id).await
    }

    pub async fn detach_printer(&self, id: Uuid, printer_id: Uuid, user_name: &str) -> AppResult<ContractDetail> {
        let mut tx = self.db.begin().await?;
        let contract = lock_contract(&mut tx, id).await?;
        let detached = sqlx::query(
            r#"
            UPDATE contract_printers
            SET detached_at = NOW()
            WHERE contract_id = $1 AND printer_id = $2 AND detached_at IS NULL
            "#,
        )
        .bind(id)
        .bind(printer_id)
        .execute(&mut *tx)
        .await?;
        if detached.rows_affected() == 0 {
            return Err(AppError::NotFound("Attached printer".to_string()));
        }

        audit::record(
            &mut tx,
            "Printer detached from contract",
            &format!("{} from {}", printer_id, contract.contract_number),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get(id).await
    }

    /// Bill one period from the counter readings of every attached printer
    pub async fn issue_billing(
        &self,
        id: Uuid,
        input: IssueBillingInput,
        user_name: &str,
    ) -> AppResult<BillingDetail> {
        let period = period_of(input.year, input.month)?;

        let mut tx = self.db.begin().await?;
        let contract = lock_contract(&mut tx, id).await?;
        if contract.status != ContractStatus::Active.as_str() {
            return Err(AppError::BusinessRule(format!(
                "Contract {} is {} and cannot be billed",
                contract.contract_number, contract.status
            )));
        }

        let latest = latest_issued(&mut tx, id).await?;
        if let Some(last) = &latest {
            let last_period = (last.period_year, last.period_month as u32);
            if (period.year, period.month) == last_period {
                return Err(AppError::Conflict {
                    resource: "billing".to_string(),
                    message: format!("Period {} is already billed", period),
                    message_pt: "Período já faturado".to_string(),
                });
            }
            if (period.year, period.month) < last_period {
                return Err(AppError::BusinessRule(format!(
                    "Period {} is before the last billed period {}-{:02}",
                    period, last.period_year, last.period_month
                )));
            }
        }

        let attached = attached_printers(&mut tx, id).await?;
        let readings = match_readings(&attached, &input.readings)?;
        let billing = compute_billing(&contract.terms(), &readings)?;

        let billing_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO contract_billings (
                contract_id, period_year, period_month, pages, excess_pages, monthly_fee,
                overage_amount, total, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(period.year)
        .bind(period.month as i32)
        .bind(billing.pages)
        .bind(billing.excess_pages)
        .bind(billing.monthly_fee)
        .bind(billing.overage_amount)
        .bind(billing.total)
        .bind(BillingStatus::Issued.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for line in &billing.lines {
            sqlx::query(
                r#"
                INSERT INTO contract_billing_lines (
                    billing_id, printer_id, previous_counter, current_counter, pages, amount
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(billing_id)
            .bind(line.printer_id)
            .bind(line.previous_counter)
            .bind(line.current_counter)
            .bind(line.pages)
            .bind(line.amount)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE printers SET counter = GREATEST(counter, $2), updated_at = NOW() WHERE id = $1",
            )
            .bind(line.printer_id)
            .bind(line.current_counter)
            .execute(&mut *tx)
            .await?;
        }

        if billing.total > Decimal::ZERO {
            let entry_id = finance::insert_entry(
                &mut tx,
                &NewLedgerEntry {
                    kind: EntryKind::Receivable,
                    description: format!("Contract {} - {}", contract.contract_number, period),
                    client_id: Some(contract.client_id),
                    supplier_id: None,
                    amount: billing.total,
                    due_date: billing_due_date(period, contract.billing_day),
                    source: EntrySource::ContractBilling,
                    source_id: Some(billing_id),
                    notes: None,
                },
            )
            .await?;
            sqlx::query("UPDATE contract_billings SET ledger_entry_id = $2 WHERE id = $1")
                .bind(billing_id)
                .bind(entry_id)
                .execute(&mut *tx)
                .await?;
        }

        audit::record(
            &mut tx,
            "Contract billing issued",
            &format!(
                "{} {}: {} pages, {}",
                contract.contract_number,
                period,
                billing.pages,
                format_brl(billing.total)
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_billing(billing_id).await
    }

    /// Void the latest issued billing of its contract
    pub async fn void_billing(&self, billing_id: Uuid, user_name: &str) -> AppResult<BillingDetail> {
        let mut tx = self.db.begin().await?;
        let billing = sqlx::query_as::<_, BillingLock>(
            r#"
            SELECT id, contract_id, period_year, period_month, status
            FROM contract_billings
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(billing_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Billing".to_string()))?;

        if billing.status != BillingStatus::Issued.as_str() {
            return Err(AppError::InvalidStateTransition("Billing is already voided".to_string()));
        }
        let contract = lock_contract(&mut tx, billing.contract_id).await?;
        let latest = latest_issued(&mut tx, billing.contract_id).await?;
        if latest.map(|l| l.id) != Some(billing.id) {
            return Err(AppError::BusinessRule(
                "Only the latest issued billing of a contract can be voided".to_string(),
            ));
        }

        sqlx::query("UPDATE contract_billings SET status = $2, voided_at = NOW() WHERE id = $1")
            .bind(billing.id)
            .bind(BillingStatus::Voided.as_str())
            .execute(&mut *tx)
            .await?;
        finance::cancel_by_source(&mut tx, EntrySource::ContractBilling, billing.id).await?;

        audit::record(
            &mut tx,
            "Contract billing voided",
            &format!(
                "{} {}-{:02}",
                contract.contract_number, billing.period_year, billing.period_month
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_billing(billing_id).await
    }

    pub async fn get_billing(&self, billing_id: Uuid) -> AppResult<BillingDetail> {
        let billing = sqlx::query_as::<_, ContractBilling>(&format!(
            "SELECT {} FROM contract_billings WHERE id = $1",
            BILLING_COLUMNS
        ))
        .bind(billing_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Billing".to_string()))?;

        let lines = sqlx::query_as::<_, ContractBillingLine>(
            r#"
            SELECT l.id, l.printer_id, p.model AS printer_model, l.previous_counter,
                   l.current_counter, l.pages, l.amount
            FROM contract_billing_lines l
            LEFT JOIN printers p ON p.id = l.printer_id
            WHERE l.billing_id = $1
            ORDER BY p.model
            "#,
        )
        .bind(billing_id)
        .fetch_all(&self.db)
        .await?;

        Ok(BillingDetail { billing, lines })
    }

    /// Billings of a contract, newest period first
    pub async fn list_billings(&self, id: Uuid) -> AppResult<Vec<ContractBilling>> {
        let billings = sqlx::query_as::<_, ContractBilling>(&format!(
            r#"
            SELECT {}
            FROM contract_billings
            WHERE contract_id = $1
            ORDER BY period_year DESC, period_month DESC, issued_at DESC
            "#,
            BILLING_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(billings)
    }

    /// Billed revenue of a period against the consumables shipped to the client
    pub async fn profitability(&self, id: Uuid, query: &PeriodQuery) -> AppResult<Profitability> {
        let period = period_of(query.year, query.month)?;
        let client_id = sqlx::query_scalar::<_, Uuid>("SELECT client_id FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Contract".to_string()))?;

        let revenue = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM contract_billings
            WHERE contract_id = $1 AND period_year = $2 AND period_month = $3 AND status = $4
            "#,
        )
        .bind(id)
        .bind(period.year)
        .bind(period.month as i32)
        .bind(BillingStatus::Issued.as_str())
        .fetch_one(&self.db)
        .await?;

        let from = period.first_day().and_time(NaiveTime::MIN).and_utc();
        let to = period.end_exclusive().and_time(NaiveTime::MIN).and_utc();
        let consumables_cost = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(m.quantity * m.unit_cost), 0)
            FROM stock_movements m
            JOIN rental_orders o ON o.id = m.rental_order_id
            WHERE o.client_id = $1
              AND m.movement_type = $2
              AND m.status = $3
              AND m.moved_at >= $4 AND m.moved_at < $5
            "#,
        )
        .bind(client_id)
        .bind(MovementType::RentalExit.as_str())
        .bind(MovementStatus::Active.as_str())
        .bind(from)
        .bind(to)
        .fetch_one(&self.db)
        .await?
        .round_dp(2);

        Ok(Profitability {
            contract_id: id,
            period: period.to_string(),
            revenue,
            consumables_cost,
            margin: revenue - consumables_cost,
        })
    }

    /// Sum of the monthly fees of active contracts
    pub async fn active_monthly_total(&self) -> AppResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(monthly_fee), 0) FROM contracts WHERE status = $1",
        )
        .bind(ContractStatus::Active.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}

async fn lock_contract(conn: &mut PgConnection, id: Uuid) -> AppResult<Contract> {
    sqlx::query_as::<_, Contract>(&format!("{} WHERE k.id = $1 FOR UPDATE OF k", CONTRACT_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Contract".to_string()))
}

async fn latest_issued(conn: &mut PgConnection, contract_id: Uuid) -> AppResult<Option<BillingLock>> {
    let latest = sqlx::query_as::<_, BillingLock>(
        r#"
        SELECT id, contract_id, period_year, period_month, status
        FROM contract_billings
        WHERE contract_id = $1 AND status = $2
        ORDER BY period_year DESC, period_month DESC
        LIMIT 1
        "#,
    )
    .bind(contract_id)
    .bind(BillingStatus::Issued.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(latest)
}

async fn attached_printers(conn: &mut PgConnection, contract_id: Uuid) -> AppResult<Vec<AttachedPrinter>> {
    let printers = sqlx::query_as::<_, AttachedPrinter>(
        r#"
        SELECT cp.printer_id, p.model, p.serial, p.counter, cp.start_counter,
               COALESCE((
                   SELECT l.current_counter
                   FROM contract_billing_lines l
                   JOIN contract_billings b ON b.id = l.billing_id
                   WHERE b.contract_id = cp.contract_id
                     AND b.status = $2
                     AND l.printer_id = cp.printer_id
                     AND b.issued_at >= cp.attached_at
                   ORDER BY b.period_year DESC, b.period_month DESC
                   LIMIT 1
               ), cp.start_counter) AS baseline,
               cp.attached_at
        FROM contract_printers cp
        JOIN printers p ON p.id = cp.printer_id
        WHERE cp.contract_id = $1 AND cp.detached_at IS NULL
        ORDER BY p.model, p.serial
        "#,
    )
    .bind(contract_id)
    .bind(BillingStatus::Issued.as_str())
    .fetch_all(conn)
    .await?;
    Ok(printers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(id: Uuid, baseline: i64) -> AttachedPrinter {
        AttachedPrinter {
            printer_id: id,
            model: "M404".to_string(),
            serial: "BR1".to_string(),
            counter: baseline,
            start_counter: 0,
            baseline,
            attached_at: Utc::now(),
        }
    }

    #[test]
    fn test_readings_use_baseline_as_previous() {
        let a = Uuid::new_v4();
        let readings = match_readings(
            &[attached(a, 1000)],
            &[CounterReadingInput {
                printer_id: a,
                counter: 1800,
            }],
        )
        .unwrap();
        assert_eq!(readings[0].previous_counter, 1000);
        assert_eq!(readings[0].pages(), 800);
    }

    #[test]
    fn test_missing_reading_rejected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let result = match_readings(
            &[attached(a, 0), attached(b, 0)],
            &[CounterReadingInput {
                printer_id: a,
                counter: 10,
            }],
        );
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_foreign_reading_rejected() {
        let a = Uuid::new_v4();
        let result = match_readings(
            &[attached(a, 0)],
            &[
                CounterReadingInput {
                    printer_id: a,
                    counter: 10,
                },
                CounterReadingInput {
                    printer_id: Uuid::new_v4(),
                    counter: 10,
                },
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_input_checks_terms_and_day() {
        let mut input: ContractInput = serde_json::from_str(
            r#"{
                "contract_number": "CT-001",
                "client_id": "7f1d6c2e-8a8e-4b8f-9f44-3c1e2f3a4b5c",
                "starts_on": "2024-01-01",
                "monthly_fee": "R$ 450,00",
                "franchise_pages": 5000,
                "overage_price": "0,05",
                "billing_day": 10
            }"#,
        )
        .unwrap();
        assert!(input.check().is_ok());
        assert_eq!(input.overage_price, Decimal::new(5, 2));
        input.billing_day = 31;
        assert!(matches!(input.check(), Err(AppError::BusinessRule(_)) | Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_period_of_rejects_bad_month() {
        assert!(period_of(2024, 13).is_err());
        assert_eq!(period_of(2024, 2).unwrap().to_string(), "2024-02");
    }
}
