//! Suppliers and purchase orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    compute_totals, deserialize_money, deserialize_optional_money, format_brl,
    purchase_document_number, EntryKind, EntrySource, MovementType, PricedLine,
    PurchaseOrderStatus,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::finance::{self, NewLedgerEntry};
use crate::services::stock::{self, NewMovement};

#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

// ============================================================================
// Suppliers
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl SupplierInput {
    fn check(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::field("name", "Name is required", "Informe o nome"));
        }
        if let Some(email) = clean(self.email.as_deref()) {
            if !validator::validate_email(email) {
                return Err(AppError::field(
                    "email",
                    "Invalid email format",
                    "E-mail inválido",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Purchase orders
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub order_number: i64,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub items_total: Decimal,
    pub freight: Decimal,
    pub total: Decimal,
    pub payment_terms: Option<String>,
    pub issued_on: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub delivered_on: Option<NaiveDate>,
    pub status: String,
    pub received_into_stock: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseItemInput {
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: i32,
    #[serde(deserialize_with = "deserialize_money")]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderInput {
    pub supplier_id: Uuid,
    #[serde(default, deserialize_with = "deserialize_optional_money")]
    pub freight: Option<Decimal>,
    pub payment_terms: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<PurchaseItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct DeliverOrderInput {
    #[serde(default)]
    pub receive_into_stock: bool,
    pub delivered_on: Option<NaiveDate>,
    /// Due date of the payable; defaults to the delivery date
    pub payment_due: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct OrderLock {
    order_number: i64,
    supplier_id: Uuid,
    supplier_name: String,
    total: Decimal,
    status: String,
}

#[derive(Debug, FromRow)]
struct ReceivableItem {
    product_id: Option<Uuid>,
    description: String,
    quantity: i32,
    unit_price: Decimal,
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.order_number, o.supplier_id, s.name AS supplier_name, o.items_total,
           o.freight, o.total, o.payment_terms, o.issued_on, o.expected_delivery,
           o.delivered_on, o.status, o.received_into_stock, o.notes
    FROM purchase_orders o
    JOIN suppliers s ON s.id = o.supplier_id
"#;

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_items(items: &[PurchaseItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::field(
            "items",
            "At least one item is required",
            "Informe pelo menos um item",
        ));
    }
    if items.iter().any(|i| i.quantity <= 0) {
        return Err(AppError::field(
            "quantity",
            "Quantity must be greater than zero",
            "A quantidade deve ser maior que zero",
        ));
    }
    if items.iter().any(|i| i.unit_price < Decimal::ZERO) {
        return Err(AppError::field(
            "unit_price",
            "Unit price cannot be negative",
            "O preço unitário não pode ser negativo",
        ));
    }
    if items
        .iter()
        .any(|i| i.product_id.is_none() && clean(i.description.as_deref()).is_none())
    {
        return Err(AppError::field(
            "description",
            "Items without a product need a description",
            "Itens sem produto precisam de descrição",
        ));
    }
    Ok(())
}

impl PurchaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Suppliers
    // ------------------------------------------------------------------

    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, email, phone, notes, created_at FROM suppliers ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(suppliers)
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(
            "SELECT id, name, email, phone, notes, created_at FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn create_supplier(&self, input: SupplierInput, user_name: &str) -> AppResult<Supplier> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (name, email, phone, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, notes, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(clean(input.email.as_deref()))
        .bind(clean(input.phone.as_deref()))
        .bind(clean(input.notes.as_deref()))
        .fetch_one(&mut *tx)
        .await?;

        audit::record(&mut tx, "New supplier", &supplier.name, user_name).await?;
        tx.commit().await?;
        Ok(supplier)
    }

    pub async fn update_supplier(&self, id: Uuid, input: SupplierInput, user_name: &str) -> AppResult<Supplier> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            UPDATE suppliers
            SET name = $2, email = $3, phone = $4, notes = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, notes, created_at
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(clean(input.email.as_deref()))
        .bind(clean(input.phone.as_deref()))
        .bind(clean(input.notes.as_deref()))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        audit::record(&mut tx, "Supplier updated", &supplier.name, user_name).await?;
        tx.commit().await?;
        Ok(supplier)
    }

    /// Delete a supplier together with its purchase orders
    pub async fn delete_supplier(&self, id: Uuid, user_name: &str) -> AppResult<()> {
        let supplier = self.get_supplier(id).await?;

        let mut tx = self.db.begin().await?;
        let orders = sqlx::query("DELETE FROM purchase_orders WHERE supplier_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut tx,
            "Supplier deleted",
            &format!("{} ({} purchase orders)", supplier.name, orders),
            user_name,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Create an order, or replace a pending order when `id` is given
    pub async fn save_order(
        &self,
        id: Option<Uuid>,
        input: PurchaseOrderInput,
        user_name: &str,
    ) -> AppResult<PurchaseOrderDetail> {
        check_items(&input.items)?;
        let freight = input.freight.unwrap_or(Decimal::ZERO);
        if freight < Decimal::ZERO {
            return Err(AppError::field(
                "freight",
                "Freight cannot be negative",
                "O frete não pode ser negativo",
            ));
        }
        let lines: Vec<PricedLine> = input
            .items
            .iter()
            .map(|i| PricedLine {
                quantity: i.quantity,
                unit_price: i.unit_price,
            })
            .collect();
        let totals = compute_totals(&lines, freight)?;
        let issued_on = input.issued_on.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;
        let supplier_name = sqlx::query_scalar::<_, String>("SELECT name FROM suppliers WHERE id = $1")
            .bind(input.supplier_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        let (order_id, order_number, action) = match id {
            Some(id) => {
                let order = lock_order(&mut tx, id).await?;
                if order.status != PurchaseOrderStatus::Pending.as_str() {
                    return Err(AppError::InvalidStateTransition(format!(
                        "Purchase order #{} is {} and can no longer be edited",
                        order.order_number, order.status
                    )));
                }
                sqlx::query(
                    r#"
                    UPDATE purchase_orders
                    SET supplier_id = $2, items_total = $3, freight = $4, total = $5,
                        payment_terms = $6, issued_on = $7, expected_delivery = $8, notes = $9,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(input.supplier_id)
                .bind(totals.items_total)
                .bind(totals.freight)
                .bind(totals.total)
                .bind(clean(input.payment_terms.as_deref()))
                .bind(issued_on)
                .bind(input.expected_delivery)
                .bind(clean(input.notes.as_deref()))
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM purchase_order_items WHERE order_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                (id, order.order_number, "Purchase order edited")
            }
            None => {
                let (id, number) = sqlx::query_as::<_, (Uuid, i64)>(
                    r#"
                    INSERT INTO purchase_orders (
                        supplier_id, items_total, freight, total, payment_terms, issued_on,
                        expected_delivery, status, notes
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING id, order_number
                    "#,
                )
                .bind(input.supplier_id)
                .bind(totals.items_total)
                .bind(totals.freight)
                .bind(totals.total)
                .bind(clean(input.payment_terms.as_deref()))
                .bind(issued_on)
                .bind(input.expected_delivery)
                .bind(PurchaseOrderStatus::Pending.as_str())
                .bind(clean(input.notes.as_deref()))
                .fetch_one(&mut *tx)
                .await?;
                (id, number, "New purchase order")
            }
        };

        for (item, line) in input.items.iter().zip(&lines) {
            let description = match clean(item.description.as_deref()) {
                Some(d) => d.to_string(),
                None => product_name(&mut tx, item.product_id).await?,
            };
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (order_id, product_id, description, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(line.total()?)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut tx,
            action,
            &format!(
                "{} - {} ({})",
                purchase_document_number(order_number),
                supplier_name,
                format_brl(totals.total)
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(order_id).await
    }

    pub async fn cancel_order(&self, id: Uuid, user_name: &str) -> AppResult<PurchaseOrderDetail> {
        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut tx, id).await?;
        if order.status != PurchaseOrderStatus::Pending.as_str() {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending purchase orders can be canceled; #{} is {}",
                order.order_number, order.status
            )));
        }

        sqlx::query("UPDATE purchase_orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(PurchaseOrderStatus::Canceled.as_str())
            .execute(&mut *tx)
            .await?;
        audit::record(
            &mut tx,
            "Purchase order canceled",
            &purchase_document_number(order.order_number),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(id).await
    }

    /// Mark a pending order delivered, optionally receiving its items into stock
    pub async fn deliver_order(
        &self,
        id: Uuid,
        input: DeliverOrderInput,
        user_name: &str,
    ) -> AppResult<PurchaseOrderDetail> {
        let delivered_on = input.delivered_on.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut tx, id).await?;
        if order.status != PurchaseOrderStatus::Pending.as_str() {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending purchase orders can be delivered; #{} is {}",
                order.order_number, order.status
            )));
        }
        let document = purchase_document_number(order.order_number);

        if input.receive_into_stock {
            let items = sqlx::query_as::<_, ReceivableItem>(
                r#"
                SELECT product_id, description, quantity, unit_price
                FROM purchase_order_items
                WHERE order_id = $1 AND product_id IS NOT NULL
                ORDER BY product_id
                "#,
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            if let Some(free) = items.iter().find(|i| i.unit_price <= Decimal::ZERO) {
                return Err(AppError::BusinessRule(format!(
                    "Item '{}' has no unit price and cannot be received into stock",
                    free.description
                )));
            }

            let moved_at = delivered_on
                .and_hms_opt(12, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now);
            for item in &items {
                let Some(product_id) = item.product_id else {
                    continue;
                };
                stock::receive(
                    &mut tx,
                    &NewMovement {
                        product_id,
                        movement_type: MovementType::Entry,
                        category: "Purchase order",
                        document_number: Some(&document),
                        quantity: item.quantity,
                        unit_cost: item.unit_price,
                        moved_at,
                        counterparty: Some(&order.supplier_name),
                        notes: None,
                        sale_id: None,
                        rental_order_id: None,
                        user_name,
                        before: None,
                    },
                )
                .await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = $2, delivered_on = $3, received_into_stock = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(PurchaseOrderStatus::Delivered.as_str())
        .bind(delivered_on)
        .bind(input.receive_into_stock)
        .execute(&mut *tx)
        .await?;

        if order.total > Decimal::ZERO {
            finance::insert_entry(
                &mut tx,
                &NewLedgerEntry {
                    kind: EntryKind::Payable,
                    description: format!("{} - {}", document, order.supplier_name),
                    client_id: None,
                    supplier_id: Some(order.supplier_id),
                    amount: order.total,
                    due_date: input.payment_due.unwrap_or(delivered_on),
                    source: EntrySource::PurchaseOrder,
                    source_id: Some(id),
                    notes: None,
                },
            )
            .await?;
        }

        audit::record(
            &mut tx,
            "Purchase order delivered",
            &format!(
                "{}{}",
                document,
                if input.receive_into_stock { " (received into stock)" } else { "" }
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_order(id).await
    }

    pub async fn get_order(&self, id: Uuid) -> AppResult<PurchaseOrderDetail> {
        let order = sqlx::query_as::<_, PurchaseOrder>(&format!("{} WHERE o.id = $1", ORDER_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT id, product_id, description, quantity, unit_price, total
            FROM purchase_order_items
            WHERE order_id = $1
            ORDER BY description
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(PurchaseOrderDetail { order, items })
    }

    /// Orders by issue date, newest first
    pub async fn list_orders(&self, supplier_id: Option<Uuid>) -> AppResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"{}
            WHERE ($1::UUID IS NULL OR o.supplier_id = $1)
            ORDER BY o.issued_on DESC, o.order_number DESC
            "#,
            ORDER_SELECT
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?;
        Ok(orders)
    }
}

async fn lock_order(conn: &mut PgConnection, id: Uuid) -> AppResult<OrderLock> {
    sqlx::query_as::<_, OrderLock>(
        r#"
        SELECT o.order_number, o.supplier_id, s.name AS supplier_name, o.total, o.status
        FROM purchase_orders o
        JOIN suppliers s ON s.id = o.supplier_id
        WHERE o.id = $1
        FOR UPDATE OF o
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
}

async fn product_name(conn: &mut PgConnection, product_id: Option<Uuid>) -> AppResult<String> {
    let Some(id) = product_id else {
        return Err(AppError::field(
            "description",
            "Items without a product need a description",
            "Itens sem produto precisam de descrição",
        ));
    };
    sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}
