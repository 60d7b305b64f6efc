//! Rental order service: consumables shipped to clients with rented printers

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    rental_order_edit_note, rental_order_note, DocumentStatus, ItemQuantity, MonthPeriod,
    MovementType, PeriodFilter,
};

use crate::error::{AppError, AppResult};
use crate::services::stock::{self, ExitContext, MovementOwner};
use crate::services::{audit, settings};

#[derive(Clone)]
pub struct RentalOrderService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RentalOrder {
    pub id: Uuid,
    pub order_number: i64,
    pub client_id: Uuid,
    pub client_name: String,
    pub ordered_at: DateTime<Utc>,
    pub printer_label: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RentalOrderItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct RentalOrderDetail {
    #[serde(flatten)]
    pub order: RentalOrder,
    pub items: Vec<RentalOrderItem>,
}

/// Create and edit share one input
#[derive(Debug, Deserialize)]
pub struct RentalOrderInput {
    pub client_id: Uuid,
    pub printer_label: Option<String>,
    pub notes: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemQuantity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RentalOrderFilter {
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub period: PeriodFilter,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopClient {
    pub client_id: Uuid,
    pub client_name: String,
    pub orders: i64,
    pub total_quantity: i64,
}

#[derive(Debug, FromRow)]
struct OrderLock {
    order_number: i64,
    status: String,
    ordered_at: DateTime<Utc>,
}

impl OrderLock {
    /// Date after an edit; an omitted date keeps the recorded one
    fn edited_date(&self, requested: Option<DateTime<Utc>>) -> DateTime<Utc> {
        requested.unwrap_or(self.ordered_at)
    }
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.order_number, o.client_id, c.name AS client_name, o.ordered_at,
           o.printer_label, o.notes, o.status, o.cancellation_reason,
           COALESCE((SELECT SUM(i.quantity) FROM rental_order_items i WHERE i.order_id = o.id), 0)::BIGINT
               AS total_quantity
    FROM rental_orders o
    JOIN clients c ON c.id = o.client_id
"#;

/// Timestamp bounds of a calendar month
fn month_bounds(period: MonthPeriod) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        period.first_day().and_time(NaiveTime::MIN).and_utc(),
        period.end_exclusive().and_time(NaiveTime::MIN).and_utc(),
    )
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn client_name(conn: &mut PgConnection, id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[ItemQuantity],
    names: &std::collections::BTreeMap<Uuid, stock::LockedProduct>,
) -> AppResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO rental_order_items (order_id, product_id, product_name, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&names[&item.product_id].name)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn current_items(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ItemQuantity>> {
    let rows = sqlx::query_as::<_, (Option<Uuid>, i32)>(
        "SELECT product_id, quantity FROM rental_order_items WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(product_id, quantity)| {
            product_id.map(|product_id| ItemQuantity {
                product_id,
                quantity,
            })
        })
        .collect())
}

impl RentalOrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_order(&self, input: RentalOrderInput, user_name: &str) -> AppResult<RentalOrderDetail> {
        let ordered_at = input.ordered_at.unwrap_or_else(Utc::now);
        let printer_label = clean(input.printer_label.as_deref());

        let mut tx = self.db.begin().await?;
        let client = client_name(&mut tx, input.client_id).await?;
        let order_number = settings::next_rental_order_number(&mut tx).await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO rental_orders (order_number, client_id, ordered_at, printer_label, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(order_number)
        .bind(input.client_id)
        .bind(ordered_at)
        .bind(printer_label)
        .bind(clean(input.notes.as_deref()))
        .bind(DocumentStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let document = order_number.to_string();
        let note = rental_order_note(order_number, printer_label);
        let products = stock::withdraw_lines(
            &mut tx,
            &input.items,
            &ExitContext {
                movement_type: MovementType::RentalExit,
                category: "Rental order",
                document_number: Some(&document),
                moved_at: ordered_at,
                counterparty: Some(&client),
                notes: Some(&note),
                sale_id: None,
                rental_order_id: Some(order_id),
                user_name,
            },
        )
        .await?;
        insert_items(&mut tx, order_id, &input.items, &products).await?;

        audit::record(
            &mut tx,
            "New rental order",
            &format!("Order #{} for {}", order_number, client),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(order_id).await
    }

    pub async fn get_order(&self, id: Uuid) -> AppResult<RentalOrderDetail> {
        let order = sqlx::query_as::<_, RentalOrder>(&format!("{} WHERE o.id = $1", ORDER_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Rental order".to_string()))?;

        let items = sqlx::query_as::<_, RentalOrderItem>(
            r#"
            SELECT id, product_id, product_name, quantity
            FROM rental_order_items
            WHERE order_id = $1
            ORDER BY product_name
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(RentalOrderDetail { order, items })
    }

    /// Replace the header and items of an active order.
    ///
    /// Old items go back to stock before the new set is checked, so a
    /// shortage rolls the whole edit back.
    pub async fn edit_order(
        &self,
        id: Uuid,
        input: RentalOrderInput,
        user_name: &str,
    ) -> AppResult<RentalOrderDetail> {
        let printer_label = clean(input.printer_label.as_deref());

        let mut tx = self.db.begin().await?;
        let order = self.lock_order(&mut tx, id).await?;
        if order.status == DocumentStatus::Canceled.as_str() {
            return Err(AppError::InvalidStateTransition(format!(
                "Order #{} is canceled and cannot be edited",
                order.order_number
            )));
        }
        let ordered_at = order.edited_date(input.ordered_at);
        let client = client_name(&mut tx, input.client_id).await?;

        let previous = current_items(&mut tx, id).await?;
        stock::restore_lines(&mut tx, &previous).await?;
        sqlx::query("DELETE FROM stock_movements WHERE rental_order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rental_order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let document = order.order_number.to_string();
        let note = rental_order_edit_note(order.order_number);
        let products = stock::withdraw_lines(
            &mut tx,
            &input.items,
            &ExitContext {
                movement_type: MovementType::RentalExit,
                category: "Rental order edited",
                document_number: Some(&document),
                moved_at: ordered_at,
                counterparty: Some(&client),
                notes: Some(&note),
                sale_id: None,
                rental_order_id: Some(id),
                user_name,
            },
        )
        .await?;
        insert_items(&mut tx, id, &input.items, &products).await?;

        sqlx::query(
            r#"
            UPDATE rental_orders
            SET client_id = $2, printer_label = $3, notes = $4, ordered_at = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.client_id)
        .bind(printer_label)
        .bind(clean(input.notes.as_deref()))
        .bind(ordered_at)
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            "Rental order edited",
            &format!("Order #{}", order.order_number),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(id).await
    }

    pub async fn cancel_order(
        &self,
        id: Uuid,
        input: CancelOrderInput,
        user_name: &str,
    ) -> AppResult<RentalOrderDetail> {
        let reason = clean(input.reason.as_deref());

        let mut tx = self.db.begin().await?;
        let order = self.lock_order(&mut tx, id).await?;
        if order.status == DocumentStatus::Canceled.as_str() {
            return Err(AppError::InvalidStateTransition(format!(
                "Order #{} is already canceled",
                order.order_number
            )));
        }

        let items = current_items(&mut tx, id).await?;
        stock::restore_lines(&mut tx, &items).await?;
        stock::cancel_owned_movements(&mut tx, MovementOwner::RentalOrder(id), reason).await?;

        sqlx::query(
            r#"
            UPDATE rental_orders
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
            "Rental order canceled",
            &format!(
                "Order #{}{}",
                order.order_number,
                reason.map(|r| format!(": {}", r)).unwrap_or_default()
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(id).await
    }

    /// Orders newest first, filtered by text, client and month
    pub async fn list_orders(&self, filter: &RentalOrderFilter, today: NaiveDate) -> AppResult<Vec<RentalOrder>> {
        let (from, to) = match filter.period.resolve(today).map(month_bounds) {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };
        let search = clean(filter.search.as_deref()).map(|s| format!("%{}%", s));

        let orders = sqlx::query_as::<_, RentalOrder>(&format!(
            r#"{}
            WHERE ($1::TEXT IS NULL
                   OR o.order_number::TEXT ILIKE $1
                   OR c.name ILIKE $1
                   OR o.printer_label ILIKE $1)
              AND ($2::UUID IS NULL OR o.client_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR o.ordered_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR o.ordered_at < $4)
            ORDER BY o.ordered_at DESC, o.order_number DESC
            "#,
            ORDER_SELECT
        ))
        .bind(search)
        .bind(filter.client_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(orders)
    }

    /// Clients by quantity shipped in active orders this month
    pub async fn top_clients(&self, today: NaiveDate) -> AppResult<Vec<TopClient>> {
        let (from, to) = month_bounds(MonthPeriod::containing(today));
        let clients = sqlx::query_as::<_, TopClient>(
            r#"
            SELECT c.id AS client_id, c.name AS client_name,
                   COUNT(DISTINCT o.id) AS orders,
                   COALESCE(SUM(i.quantity), 0)::BIGINT AS total_quantity
            FROM rental_orders o
            JOIN clients c ON c.id = o.client_id
            JOIN rental_order_items i ON i.order_id = o.id
            WHERE o.status = $1 AND o.ordered_at >= $2 AND o.ordered_at < $3
            GROUP BY c.id, c.name
            ORDER BY total_quantity DESC, c.name
            LIMIT 30
            "#,
        )
        .bind(DocumentStatus::Active.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(clients)
    }

    async fn lock_order(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<OrderLock> {
        sqlx::query_as::<_, OrderLock>(
            "SELECT order_number, status, ordered_at FROM rental_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental order".to_string()))
    }
}
