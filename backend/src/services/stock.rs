//! Transactional stock helpers shared by every service that moves quantity
//!
//! All helpers take the caller's connection so the product update, the
//! movement rows and the owning document commit or roll back together.
//! Product rows are locked with `FOR UPDATE` in id order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use shared::{
    aggregate_quantities, canceled_note, ItemQuantity, MovementStatus, MovementType, StockError,
    StockPosition,
};

use crate::error::{AppError, AppResult};

/// A product row held under lock
#[derive(Debug, Clone, FromRow)]
pub struct LockedProduct {
    pub id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub average_cost: Decimal,
}

impl LockedProduct {
    pub fn position(&self) -> StockPosition {
        StockPosition::new(self.quantity, self.average_cost)
    }
}

/// A movement to be written
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub category: &'a str,
    pub document_number: Option<&'a str>,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub moved_at: DateTime<Utc>,
    pub counterparty: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub sale_id: Option<Uuid>,
    pub rental_order_id: Option<Uuid>,
    pub user_name: &'a str,
    /// Product position just before an entry
    pub before: Option<StockPosition>,
}

/// Shared attributes of the exit movements written for a document
#[derive(Debug, Clone)]
pub struct ExitContext<'a> {
    pub movement_type: MovementType,
    pub category: &'a str,
    pub document_number: Option<&'a str>,
    pub moved_at: DateTime<Utc>,
    pub counterparty: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub sale_id: Option<Uuid>,
    pub rental_order_id: Option<Uuid>,
    pub user_name: &'a str,
}

/// Which document owns a set of movements
#[derive(Debug, Clone, Copy)]
pub enum MovementOwner {
    Sale(Uuid),
    RentalOrder(Uuid),
}

impl MovementOwner {
    /// Marker appended to movement notes on cancellation. Sales get the
    /// plain marker; rental orders carry the reason.
    fn cancel_marker(&self, reason: Option<&str>) -> String {
        match self {
            MovementOwner::Sale(_) => canceled_note(None, None),
            MovementOwner::RentalOrder(_) => canceled_note(None, reason),
        }
    }
}

pub async fn lock_product(conn: &mut PgConnection, id: Uuid) -> AppResult<LockedProduct> {
    sqlx::query_as::<_, LockedProduct>(
        "SELECT id, name, quantity, average_cost FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

pub async fn save_position(
    conn: &mut PgConnection,
    id: Uuid,
    position: StockPosition,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE products SET quantity = $2, average_cost = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(position.quantity)
    .bind(position.average_cost)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_movement(conn: &mut PgConnection, m: &NewMovement<'_>) -> AppResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO stock_movements (
            product_id, movement_type, category, document_number, quantity, unit_cost,
            moved_at, counterparty, notes, sale_id, rental_order_id, status, user_name,
            quantity_before, average_cost_before
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(m.product_id)
    .bind(m.movement_type.as_str())
    .bind(m.category)
    .bind(m.document_number)
    .bind(m.quantity)
    .bind(m.unit_cost)
    .bind(m.moved_at)
    .bind(m.counterparty)
    .bind(m.notes)
    .bind(m.sale_id)
    .bind(m.rental_order_id)
    .bind(MovementStatus::Active.as_str())
    .bind(m.user_name)
    .bind(m.before.map(|p| p.quantity))
    .bind(m.before.map(|p| p.average_cost))
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Receive goods into stock and record the entry movement along with the
/// position it was applied to
pub async fn receive(conn: &mut PgConnection, entry: &NewMovement<'_>) -> AppResult<StockPosition> {
    let product = lock_product(&mut *conn, entry.product_id).await?;
    let before = product.position();
    let position = before.receive(entry.quantity, entry.unit_cost)?;
    save_position(&mut *conn, product.id, position).await?;
    insert_movement(
        &mut *conn,
        &NewMovement {
            before: Some(before),
            ..entry.clone()
        },
    )
    .await?;
    Ok(position)
}

fn to_quantity(total: i64) -> Result<i32, StockError> {
    i32::try_from(total).map_err(|_| StockError::Overflow)
}

/// Lock every product of `items`, in id order
async fn lock_all(
    conn: &mut PgConnection,
    totals: &BTreeMap<Uuid, i64>,
) -> AppResult<BTreeMap<Uuid, LockedProduct>> {
    let mut locked = BTreeMap::new();
    for product_id in totals.keys() {
        let product = lock_product(&mut *conn, *product_id).await?;
        locked.insert(*product_id, product);
    }
    Ok(locked)
}

/// Take the lines of a document out of stock.
///
/// All products are checked before anything is written; any shortage rejects
/// the whole set. One movement is written per line, costed at the product's
/// average cost. Returns the locked products (pre-withdrawal) by id.
pub async fn withdraw_lines(
    conn: &mut PgConnection,
    lines: &[ItemQuantity],
    ctx: &ExitContext<'_>,
) -> AppResult<BTreeMap<Uuid, LockedProduct>> {
    if lines.is_empty() {
        return Err(AppError::field(
            "items",
            "At least one item is required",
            "Informe pelo menos um item",
        ));
    }
    if lines.iter().any(|l| l.quantity <= 0) {
        return Err(StockError::NonPositiveQuantity.into());
    }

    let totals = aggregate_quantities(lines);
    let locked = lock_all(&mut *conn, &totals).await?;

    let shortages: Vec<String> = totals
        .iter()
        .filter_map(|(id, requested)| {
            let product = &locked[id];
            (i64::from(product.quantity) < *requested).then(|| {
                format!(
                    "{} ({} available, {} requested)",
                    product.name, product.quantity, requested
                )
            })
        })
        .collect();
    if !shortages.is_empty() {
        tracing::warn!(shortages = ?shortages, "Stock withdrawal rejected");
        return Err(AppError::InsufficientStock(shortages.join("; ")));
    }

    for (id, requested) in &totals {
        let product = &locked[id];
        let position = product.position().withdraw(to_quantity(*requested)?)?;
        save_position(&mut *conn, *id, position).await?;
    }

    for line in lines {
        let product = &locked[&line.product_id];
        insert_movement(
            &mut *conn,
            &NewMovement {
                product_id: line.product_id,
                movement_type: ctx.movement_type,
                category: ctx.category,
                document_number: ctx.document_number,
                quantity: line.quantity,
                unit_cost: product.average_cost,
                moved_at: ctx.moved_at,
                counterparty: ctx.counterparty,
                notes: ctx.notes,
                sale_id: ctx.sale_id,
                rental_order_id: ctx.rental_order_id,
                user_name: ctx.user_name,
                before: None,
            },
        )
        .await?;
    }

    Ok(locked)
}

/// Put the lines of a canceled or edited document back into stock
pub async fn restore_lines(conn: &mut PgConnection, lines: &[ItemQuantity]) -> AppResult<()> {
    let totals = aggregate_quantities(lines);
    let locked = lock_all(&mut *conn, &totals).await?;
    for (id, restored) in &totals {
        let position = locked[id].position().restore(to_quantity(*restored)?)?;
        save_position(&mut *conn, *id, position).await?;
    }
    Ok(())
}

/// Mark the active movements of a document canceled
pub async fn cancel_owned_movements(
    conn: &mut PgConnection,
    owner: MovementOwner,
    reason: Option<&str>,
) -> AppResult<u64> {
    let (column, id) = match owner {
        MovementOwner::Sale(id) => ("sale_id", id),
        MovementOwner::RentalOrder(id) => ("rental_order_id", id),
    };
    let suffix = owner.cancel_marker(reason);
    let result = sqlx::query(&format!(
        r#"
        UPDATE stock_movements
        SET status = $2, cancellation_reason = $3, notes = TRIM(COALESCE(notes, '') || ' ' || $4)
        WHERE {} = $1 AND status = $5
        "#,
        column
    ))
    .bind(id)
    .bind(MovementStatus::Canceled.as_str())
    .bind(reason)
    .bind(&suffix)
    .bind(MovementStatus::Active.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_quantity_bounds() {
        assert_eq!(to_quantity(5), Ok(5));
        assert_eq!(to_quantity(i64::from(i32::MAX) + 1), Err(StockError::Overflow));
    }

    #[test]
    fn test_cancel_marker_per_owner() {
        let id = Uuid::new_v4();
        assert_eq!(
            MovementOwner::Sale(id).cancel_marker(Some("wrong client")),
            "[CANCELED]"
        );
        assert_eq!(
            MovementOwner::RentalOrder(id).cancel_marker(Some("wrong client")),
            canceled_note(None, Some("wrong client"))
        );
        assert_eq!(MovementOwner::RentalOrder(id).cancel_marker(None), "[CANCELED]");
    }

    #[test]
    fn test_locked_product_position() {
        let p = LockedProduct {
            id: Uuid::new_v4(),
            name: "Toner".to_string(),
            quantity: 3,
            average_cost: Decimal::new(1250, 2),
        };
        assert_eq!(p.position(), StockPosition::new(3, Decimal::new(1250, 2)));
    }
}
