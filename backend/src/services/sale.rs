//! Sales service: stock-checked sales, tracking updates and cancellation

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::{
    deserialize_money, format_brl, line_total, sale_document_number, sum_amounts,
    AmountOverflow, BoletoStatus, DocumentStatus, EntryKind, EntrySource, InvoiceStatus,
    ItemQuantity, MovementType, PaymentMethod, PaymentStatus, SaleRuleError, SaleStatusFilter,
    SaleTracking, SaleTrackingUpdate, ShippingStatus,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::finance::{self, NewLedgerEntry};
use crate::services::stock::{self, ExitContext, MovementOwner};

#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub sale_number: i64,
    pub client_id: Uuid,
    pub client_name: String,
    pub sold_at: DateTime<Utc>,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub due_date: Option<NaiveDate>,
    pub payment_status: String,
    pub invoice_status: String,
    pub invoice_number: Option<String>,
    pub boleto_status: Option<String>,
    pub boleto_number: Option<String>,
    pub shipping_status: String,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SaleItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Deserialize)]
pub struct SaleItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(deserialize_with = "deserialize_money")]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleInput {
    pub client_id: Uuid,
    pub payment_method: PaymentMethod,
    pub due_date: Option<NaiveDate>,
    pub sold_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<SaleItemInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status_filter: Option<SaleStatusFilter>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSaleInput {
    pub reason: Option<String>,
}

/// Flat row written to the sales CSV export
#[derive(Debug, Serialize)]
pub struct SaleExportRow {
    pub number: i64,
    pub date: String,
    pub client: String,
    pub total: String,
    pub payment_method: String,
    pub due_date: String,
    pub payment_status: String,
    pub invoice_status: String,
    pub invoice_number: String,
    pub shipping_status: String,
}

const SALE_SELECT: &str = r#"
    SELECT s.id, s.sale_number, s.client_id, c.name AS client_name, s.sold_at, s.total_amount,
           s.payment_method, s.due_date, s.payment_status, s.invoice_status, s.invoice_number,
           s.boleto_status, s.boleto_number, s.shipping_status, s.status,
           s.cancellation_reason, s.notes
    FROM sales s
    JOIN clients c ON c.id = s.client_id
"#;

impl Sale {
    /// Tracking state as the pure rules see it
    fn tracking(&self) -> AppResult<SaleTracking> {
        let invalid = |field: &str| AppError::Internal(format!("Invalid stored {} on sale", field));
        Ok(SaleTracking {
            payment_method: PaymentMethod::from_str(&self.payment_method)
                .ok_or_else(|| invalid("payment_method"))?,
            due_date: self.due_date,
            payment_status: PaymentStatus::from_str(&self.payment_status)
                .ok_or_else(|| invalid("payment_status"))?,
            invoice_status: InvoiceStatus::from_str(&self.invoice_status)
                .ok_or_else(|| invalid("invoice_status"))?,
            invoice_number: self.invoice_number.clone(),
            boleto_status: self.boleto_status.as_deref().and_then(BoletoStatus::from_str),
            boleto_number: self.boleto_number.clone(),
            shipping_status: ShippingStatus::from_str(&self.shipping_status)
                .ok_or_else(|| invalid("shipping_status"))?,
        })
    }

    fn is_canceled(&self) -> bool {
        self.status == DocumentStatus::Canceled.as_str()
    }
}

/// Whole-day bounds of an inclusive date range
fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = start.and_time(NaiveTime::MIN).and_utc();
    let to = end
        .succ_opt()
        .unwrap_or(end)
        .and_time(NaiveTime::MIN)
        .and_utc();
    (from, to)
}

impl SaleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_sale(&self, input: CreateSaleInput, user_name: &str) -> AppResult<SaleDetail> {
        if input.items.is_empty() {
            return Err(AppError::field(
                "items",
                "At least one item is required",
                "Informe pelo menos um item",
            ));
        }
        if input.items.iter().any(|i| i.unit_price < Decimal::ZERO) {
            return Err(AppError::field(
                "unit_price",
                "Unit price cannot be negative",
                "O preço unitário não pode ser negativo",
            ));
        }

        let sold_at = input.sold_at.unwrap_or_else(Utc::now);
        let tracking = SaleTracking::new(input.payment_method, input.due_date);
        let total = sale_total(&input.items)?;

        let mut tx = self.db.begin().await?;

        let client_name = sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
            .bind(input.client_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Client".to_string()))?;

        let (sale_id, sale_number) = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            INSERT INTO sales (
                client_id, sold_at, total_amount, payment_method, due_date, payment_status,
                invoice_status, boleto_status, shipping_status, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, sale_number
            "#,
        )
        .bind(input.client_id)
        .bind(sold_at)
        .bind(total)
        .bind(tracking.payment_method.as_str())
        .bind(tracking.due_date)
        .bind(tracking.payment_status.as_str())
        .bind(tracking.invoice_status.as_str())
        .bind(tracking.boleto_status.map(|b| b.as_str()))
        .bind(tracking.shipping_status.as_str())
        .bind(DocumentStatus::Active.as_str())
        .bind(input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()))
        .fetch_one(&mut *tx)
        .await?;

        let lines: Vec<ItemQuantity> = input
            .items
            .iter()
            .map(|i| ItemQuantity {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();
        let document = sale_document_number(sale_number);
        let note = format!("Sale #{}", sale_number);
        let products = stock::withdraw_lines(
            &mut tx,
            &lines,
            &ExitContext {
                movement_type: MovementType::Sale,
                category: "Sale",
                document_number: Some(&document),
                moved_at: sold_at,
                counterparty: Some(&client_name),
                notes: Some(&note),
                sale_id: Some(sale_id),
                rental_order_id: None,
                user_name,
            },
        )
        .await?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_id, product_id, product_name, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(sale_id)
            .bind(item.product_id)
            .bind(&products[&item.product_id].name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(line_total(item.quantity, item.unit_price)?)
            .execute(&mut *tx)
            .await?;
        }

        if total > Decimal::ZERO {
            finance::insert_entry(
                &mut tx,
                &NewLedgerEntry {
                    kind: EntryKind::Receivable,
                    description: format!("Sale #{} - {}", sale_number, client_name),
                    client_id: Some(input.client_id),
                    supplier_id: None,
                    amount: total,
                    due_date: tracking.due_date.unwrap_or_else(|| sold_at.date_naive()),
                    source: EntrySource::Sale,
                    source_id: Some(sale_id),
                    notes: None,
                },
            )
            .await?;
        }

        audit::record(
            &mut tx,
            "New sale",
            &format!("Sale #{} to {} ({})", sale_number, client_name, format_brl(total)),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_sale(sale_id).await
    }

    pub async fn get_sale(&self, id: Uuid) -> AppResult<SaleDetail> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{} WHERE s.id = $1", SALE_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, product_id, product_name, quantity, unit_price, total
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY product_name
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(SaleDetail { sale, items })
    }

    /// Update the tracking fields of an active sale
    pub async fn update_sale(
        &self,
        id: Uuid,
        update: SaleTrackingUpdate,
        user_name: &str,
    ) -> AppResult<SaleDetail> {
        let mut tx = self.db.begin().await?;
        let sale = sqlx::query_as::<_, Sale>(&format!("{} WHERE s.id = $1 FOR UPDATE OF s", SALE_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        if sale.is_canceled() {
            return Err(SaleRuleError::SaleCanceled.into());
        }

        let next = sale.tracking()?.apply_update(&update)?;

        sqlx::query(
            r#"
            UPDATE sales
            SET payment_method = $2, due_date = $3, payment_status = $4, invoice_status = $5,
                invoice_number = $6, boleto_status = $7, boleto_number = $8,
                shipping_status = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.payment_method.as_str())
        .bind(next.due_date)
        .bind(next.payment_status.as_str())
        .bind(next.invoice_status.as_str())
        .bind(&next.invoice_number)
        .bind(next.boleto_status.map(|b| b.as_str()))
        .bind(&next.boleto_number)
        .bind(next.shipping_status.as_str())
        .execute(&mut *tx)
        .await?;

        if let Some(due) = update.due_date {
            finance::reschedule_source(&mut tx, EntrySource::Sale, id, due).await?;
        }

        audit::record(
            &mut tx,
            "Sale updated",
            &format!("Sale #{}", sale.sale_number),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_sale(id).await
    }

    /// Cancel a sale, returning its items to stock and voiding its receivable
    pub async fn cancel_sale(
        &self,
        id: Uuid,
        input: CancelSaleInput,
        user_name: &str,
    ) -> AppResult<SaleDetail> {
        let reason = input
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let mut tx = self.db.begin().await?;
        let sale = sqlx::query_as::<_, Sale>(&format!("{} WHERE s.id = $1 FOR UPDATE OF s", SALE_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        if sale.is_canceled() {
            return Err(AppError::InvalidStateTransition(format!(
                "Sale #{} is already canceled",
                sale.sale_number
            )));
        }

        let lines = sqlx::query_as::<_, (Option<Uuid>, i32)>(
            "SELECT product_id, quantity FROM sale_items WHERE sale_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .filter_map(|(product_id, quantity)| {
            product_id.map(|product_id| ItemQuantity {
                product_id,
                quantity,
            })
        })
        .collect::<Vec<_>>();

        stock::restore_lines(&mut tx, &lines).await?;
        stock::cancel_owned_movements(&mut tx, MovementOwner::Sale(id), reason).await?;
        finance::cancel_by_source(&mut tx, EntrySource::Sale, id).await?;

        sqlx::query(
            r#"
            UPDATE sales
            SET status = $2, cancellation_reason = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DocumentStatus::Canceled.as_str())
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            "Sale canceled",
            &format!(
                "Sale #{}{}",
                sale.sale_number,
                reason.map(|r| format!(": {}", r)).unwrap_or_default()
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_sale(id).await
    }

    /// Non-canceled sales, newest first
    pub async fn list_sales(&self, filter: &SaleFilter, today: NaiveDate) -> AppResult<Vec<Sale>> {
        let (from, to) = match (filter.start_date, filter.end_date) {
            (Some(start), Some(end)) => {
                let (from, to) = day_bounds(start, end);
                (Some(from), Some(to))
            }
            _ => (None, None),
        };
        let paid = PaymentStatus::Paid.as_str();
        let (unpaid_only, paid_only, overdue_only) = match filter.status_filter {
            Some(SaleStatusFilter::Pending) => (true, false, false),
            Some(SaleStatusFilter::Finished) => (false, true, false),
            Some(SaleStatusFilter::Overdue) => (true, false, true),
            None => (false, false, false),
        };

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"{}
            WHERE s.status = $1
              AND ($2::TIMESTAMPTZ IS NULL OR s.sold_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR s.sold_at < $3)
              AND ($4 = FALSE OR s.payment_status <> $7)
              AND ($5 = FALSE OR s.payment_status = $7)
              AND ($6 = FALSE OR (s.due_date IS NOT NULL AND s.due_date < $8))
              AND ($9::TEXT IS NULL OR s.payment_status = $9)
            ORDER BY s.sold_at DESC
            "#,
            SALE_SELECT
        ))
        .bind(DocumentStatus::Active.as_str())
        .bind(from)
        .bind(to)
        .bind(unpaid_only)
        .bind(paid_only)
        .bind(overdue_only)
        .bind(paid)
        .bind(today)
        .bind(filter.payment_status.map(|p| p.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(sales)
    }

    /// Unpaid active sales with a due date, soonest first. `until` caps the due date.
    pub async fn due_sales(&self, until: Option<NaiveDate>) -> AppResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"{}
            WHERE s.status = $1
              AND s.payment_status <> $2
              AND s.due_date IS NOT NULL
              AND ($3::DATE IS NULL OR s.due_date <= $3)
            ORDER BY s.due_date
            "#,
            SALE_SELECT
        ))
        .bind(DocumentStatus::Active.as_str())
        .bind(PaymentStatus::Paid.as_str())
        .bind(until)
        .fetch_all(&self.db)
        .await?;
        Ok(sales)
    }

    pub async fn canceled_sales(&self) -> AppResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{} WHERE s.status = $1 ORDER BY s.sold_at DESC",
            SALE_SELECT
        ))
        .bind(DocumentStatus::Canceled.as_str())
        .fetch_all(&self.db)
        .await?;
        Ok(sales)
    }

    pub async fn export_rows(&self, filter: &SaleFilter, today: NaiveDate) -> AppResult<Vec<SaleExportRow>> {
        let sales = self.list_sales(filter, today).await?;
        Ok(sales
            .into_iter()
            .map(|s| SaleExportRow {
                number: s.sale_number,
                date: s.sold_at.format("%d/%m/%Y").to_string(),
                client: s.client_name,
                total: format_brl(s.total_amount),
                payment_method: s.payment_method,
                due_date: s
                    .due_date
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_default(),
                payment_status: s.payment_status,
                invoice_status: s.invoice_status,
                invoice_number: s.invoice_number.unwrap_or_default(),
                shipping_status: s.shipping_status,
            })
            .collect())
    }
}

/// Mark a sale paid or pending when its receivable is settled or reopened
pub async fn set_payment_status(
    conn: &mut sqlx::PgConnection,
    sale_id: Uuid,
    status: PaymentStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE sales SET payment_status = $2, updated_at = NOW() WHERE id = $1 AND status = $3")
        .bind(sale_id)
        .bind(status.as_str())
        .bind(DocumentStatus::Active.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Sum of the rounded line totals
fn sale_total(items: &[SaleItemInput]) -> Result<Decimal, AmountOverflow> {
    sum_amounts(
        items
            .iter()
            .map(|i| line_total(i.quantity, i.unit_price))
            .collect::<Result<Vec<_>, _>>()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_total_sums_rounded_lines() {
        let items = [
            SaleItemInput {
                product_id: Uuid::new_v4(),
                quantity: 3,
                unit_price: Decimal::new(3333, 3),
            },
            SaleItemInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: Decimal::new(1000, 2),
            },
        ];
        // 3 x 3.333 = 9.999 -> 10.00
        assert_eq!(sale_total(&items), Ok(Decimal::new(2000, 2)));
    }

    #[test]
    fn test_sale_total_overflow_is_an_error() {
        let items = [SaleItemInput {
            product_id: Uuid::new_v4(),
            quantity: 2,
            unit_price: Decimal::MAX,
        }];
        assert_eq!(sale_total(&items), Err(AmountOverflow));
    }

    #[test]
    fn test_day_bounds_include_whole_end_day() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (from, to) = day_bounds(start, end);
        assert_eq!(from.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-04-01T00:00:00+00:00");
    }

    #[test]
    fn test_create_input_accepts_formatted_prices() {
        let input: CreateSaleInput = serde_json::from_str(
            r#"{
                "client_id": "7f1d6c2e-8a8e-4b8f-9f44-3c1e2f3a4b5c",
                "payment_method": "boleto",
                "items": [
                    {"product_id": "0b8f0e3a-1d2c-4e5f-8a9b-0c1d2e3f4a5b", "quantity": 2, "unit_price": "R$ 1.234,56"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(input.payment_method, PaymentMethod::Boleto);
        assert_eq!(input.items[0].unit_price, Decimal::new(123456, 2));
    }

    #[test]
    fn test_tracking_from_stored_row() {
        let sale = Sale {
            id: Uuid::new_v4(),
            sale_number: 1,
            client_id: Uuid::new_v4(),
            client_name: "Acme".to_string(),
            sold_at: Utc::now(),
            total_amount: Decimal::ZERO,
            payment_method: "boleto".to_string(),
            due_date: None,
            payment_status: "pending".to_string(),
            invoice_status: "missing".to_string(),
            invoice_number: None,
            boleto_status: Some("missing".to_string()),
            boleto_number: None,
            shipping_status: "pending".to_string(),
            status: "active".to_string(),
            cancellation_reason: None,
            notes: None,
        };
        let tracking = sale.tracking().unwrap();
        assert_eq!(tracking.boleto_status, Some(BoletoStatus::Missing));
        assert!(!sale.is_canceled());
    }
}
