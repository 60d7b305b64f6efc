//! Product catalog and manual stock operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    canceled_note, deserialize_money, deserialize_optional_money, format_brl,
    format_product_code, AdjustmentKind, MovementStatus, MovementType, StockError, StockPosition,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::stock::{self, NewMovement};

const RECENT_MOVEMENTS: i64 = 30;
const TOP_OUTFLOW_PRODUCTS: i64 = 30;

#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    product_number: i64,
    name: String,
    category: Option<String>,
    brand: Option<String>,
    compatibility: Option<String>,
    quantity: i32,
    minimum: i32,
    average_cost: Decimal,
    sale_price: Decimal,
    notes: Option<String>,
    last_movement_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub compatibility: Option<String>,
    pub quantity: i32,
    pub minimum: i32,
    pub average_cost: Decimal,
    pub sale_price: Decimal,
    pub stock_value: Decimal,
    pub notes: Option<String>,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            code: format_product_code(row.product_number),
            stock_value: StockPosition::new(row.quantity, row.average_cost).stock_value(),
            name: row.name,
            category: row.category,
            brand: row.brand,
            compatibility: row.compatibility,
            quantity: row.quantity,
            minimum: row.minimum,
            average_cost: row.average_cost,
            sale_price: row.sale_price,
            notes: row.notes,
            last_movement_at: row.last_movement_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub movement_type: String,
    pub category: Option<String>,
    pub document_number: Option<String>,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub moved_at: DateTime<Utc>,
    pub counterparty: Option<String>,
    pub notes: Option<String>,
    pub sale_id: Option<Uuid>,
    pub rental_order_id: Option<Uuid>,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OutflowRank {
    pub product_id: Uuid,
    pub name: String,
    pub total_out: i64,
}

#[derive(Debug, Serialize)]
pub struct StockOverview {
    pub products: Vec<Product>,
    pub recent_movements: Vec<StockMovement>,
    pub total_stock_value: Decimal,
    pub total_units: i64,
    pub top_outflows: Vec<OutflowRank>,
    pub brands: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive substring; "all" disables the filter
    pub brand: Option<String>,
    #[serde(default)]
    pub available_only: bool,
}

impl ProductFilter {
    fn brand_pattern(&self) -> Option<String> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case("all"))
            .map(|b| b.to_string())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub compatibility: Option<String>,
    #[validate(range(min = 0, message = "Minimum cannot be negative"))]
    pub minimum: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_money")]
    pub sale_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub kind: AdjustmentKind,
    pub quantity: i32,
    #[serde(default, deserialize_with = "deserialize_optional_money")]
    pub unit_cost: Option<Decimal>,
    pub origin_category: Option<String>,
    pub document_number: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub moved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct EditEntryInput {
    pub quantity: i32,
    #[serde(deserialize_with = "deserialize_money")]
    pub unit_cost: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelInput {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Flat row written to the products CSV export
#[derive(Debug, Serialize)]
pub struct ProductExportRow {
    pub code: String,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub quantity: i32,
    pub minimum: i32,
    pub average_cost: String,
    pub sale_price: String,
    pub stock_value: String,
}

#[derive(Debug, FromRow)]
struct MovementLock {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: i32,
    unit_cost: Decimal,
    status: String,
    notes: Option<String>,
    sale_id: Option<Uuid>,
    rental_order_id: Option<Uuid>,
    quantity_before: Option<i32>,
    average_cost_before: Option<Decimal>,
}

impl MovementLock {
    /// Product position the entry was applied to, when recorded
    fn before(&self) -> Option<StockPosition> {
        Some(StockPosition::new(
            self.quantity_before?,
            self.average_cost_before?,
        ))
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.product_number, p.name, p.category, p.brand, p.compatibility,
           p.quantity, p.minimum, p.average_cost, p.sale_price, p.notes,
           (SELECT MAX(m.moved_at) FROM stock_movements m
             WHERE m.product_id = p.id AND m.status = 'active') AS last_movement_at,
           p.created_at
    FROM products p
"#;

pub(crate) const MOVEMENT_SELECT: &str = r#"
    SELECT m.id, m.product_id, p.name AS product_name, m.movement_type, m.category,
           m.document_number, m.quantity, m.unit_cost, m.moved_at, m.counterparty, m.notes,
           m.sale_id, m.rental_order_id, m.status, m.cancellation_reason, m.user_name
    FROM stock_movements m
    JOIN products p ON p.id = m.product_id
"#;

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"{}
            WHERE ($1::TEXT IS NULL OR p.brand ILIKE '%' || $1 || '%')
              AND ($2 = FALSE OR p.quantity > 0)
            ORDER BY p.name
            "#,
            PRODUCT_SELECT
        ))
        .bind(filter.brand_pattern())
        .bind(filter.available_only)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!("{} WHERE p.id = $1", PRODUCT_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Product::from)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Stock screen: products, recent movements, totals and outflow ranking
    pub async fn stock_overview(&self, filter: &ProductFilter) -> AppResult<StockOverview> {
        let products = self.list_products(filter).await?;

        let recent_movements = sqlx::query_as::<_, StockMovement>(&format!(
            "{} ORDER BY m.moved_at DESC, m.created_at DESC LIMIT $1",
            MOVEMENT_SELECT
        ))
        .bind(RECENT_MOVEMENTS)
        .fetch_all(&self.db)
        .await?;

        let (total_stock_value, total_units) = stock_totals(&products);

        let top_outflows = sqlx::query_as::<_, OutflowRank>(
            r#"
            SELECT p.id AS product_id, p.name, COALESCE(SUM(m.quantity), 0)::BIGINT AS total_out
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            WHERE m.status = $1 AND m.movement_type = ANY($2)
            GROUP BY p.id, p.name
            ORDER BY total_out DESC, p.name
            LIMIT $3
            "#,
        )
        .bind(MovementStatus::Active.as_str())
        .bind(MovementType::outflows().to_vec())
        .bind(TOP_OUTFLOW_PRODUCTS)
        .fetch_all(&self.db)
        .await?;

        let brands = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT brand FROM products
            WHERE brand IS NOT NULL AND brand <> ''
            ORDER BY brand
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(StockOverview {
            products,
            recent_movements,
            total_stock_value,
            total_units,
            top_outflows,
            brands,
        })
    }

    pub async fn create_product(&self, input: ProductInput, user_name: &str) -> AppResult<Product> {
        input.validate()?;
        let name = input.name.trim();

        let mut tx = self.db.begin().await?;
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (name, category, brand, compatibility, minimum, sale_price, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(non_blank(input.category.as_deref()))
        .bind(non_blank(input.brand.as_deref()))
        .bind(non_blank(input.compatibility.as_deref()))
        .bind(input.minimum.unwrap_or(5))
        .bind(input.sale_price.unwrap_or(Decimal::ZERO))
        .bind(non_blank(input.notes.as_deref()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "name"))?;

        audit::record(&mut tx, "New product", name, user_name).await?;
        tx.commit().await?;

        self.get_product(id).await
    }

    /// Update descriptive fields; quantity and cost only change through movements
    pub async fn update_product(
        &self,
        id: Uuid,
        input: ProductInput,
        user_name: &str,
    ) -> AppResult<Product> {
        input.validate()?;
        let name = input.name.trim();

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, category = $3, brand = $4, compatibility = $5,
                minimum = COALESCE($6, minimum), sale_price = COALESCE($7, sale_price),
                notes = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(non_blank(input.category.as_deref()))
        .bind(non_blank(input.brand.as_deref()))
        .bind(non_blank(input.compatibility.as_deref()))
        .bind(input.minimum)
        .bind(input.sale_price)
        .bind(non_blank(input.notes.as_deref()))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "name"))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        audit::record(&mut tx, "Product updated", name, user_name).await?;
        tx.commit().await?;

        self.get_product(id).await
    }

    /// Delete a product with no units on hand, together with its movements
    pub async fn delete_product(&self, id: Uuid, user_name: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let product = stock::lock_product(&mut tx, id).await?;
        if product.quantity != 0 {
            return Err(AppError::BusinessRule(format!(
                "Product {} still has {} units in stock",
                product.name, product.quantity
            )));
        }

        sqlx::query("DELETE FROM stock_movements WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::record(&mut tx, "Product deleted", &product.name, user_name).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Manual entry or exit
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        input: AdjustStockInput,
        user_name: &str,
    ) -> AppResult<Product> {
        if input.quantity <= 0 {
            return Err(StockError::NonPositiveQuantity.into());
        }
        let moved_at = input.moved_at.unwrap_or_else(Utc::now);

        let mut tx = self.db.begin().await?;
        let product = stock::lock_product(&mut tx, product_id).await?;

        let details = match input.kind {
            AdjustmentKind::Entry => {
                let unit_cost = input.unit_cost.unwrap_or(Decimal::ZERO);
                if unit_cost <= Decimal::ZERO {
                    return Err(StockError::NonPositiveCost.into());
                }
                let category = non_blank(input.origin_category.as_deref()).unwrap_or("Purchase");
                stock::receive(
                    &mut tx,
                    &NewMovement {
                        product_id,
                        movement_type: MovementType::Entry,
                        category,
                        document_number: non_blank(input.document_number.as_deref()),
                        quantity: input.quantity,
                        unit_cost,
                        moved_at,
                        counterparty: non_blank(input.supplier.as_deref()),
                        notes: non_blank(input.notes.as_deref()),
                        sale_id: None,
                        rental_order_id: None,
                        user_name,
                        before: None,
                    },
                )
                .await?;
                format!(
                    "Entry of {} x {} at {}",
                    input.quantity,
                    product.name,
                    format_brl(unit_cost)
                )
            }
            AdjustmentKind::Exit => {
                let position = product.position().withdraw(input.quantity)?;
                stock::save_position(&mut tx, product_id, position).await?;
                stock::insert_movement(
                    &mut tx,
                    &NewMovement {
                        product_id,
                        movement_type: MovementType::AdjustmentExit,
                        category: "Manual adjustment",
                        document_number: non_blank(input.document_number.as_deref()),
                        quantity: input.quantity,
                        unit_cost: product.average_cost,
                        moved_at,
                        counterparty: Some("Adjustment"),
                        notes: non_blank(input.notes.as_deref()),
                        sale_id: None,
                        rental_order_id: None,
                        user_name,
                        before: None,
                    },
                )
                .await?;
                format!("Exit of {} x {}", input.quantity, product.name)
            }
        };

        audit::record(&mut tx, "Stock adjustment", &details, user_name).await?;
        tx.commit().await?;

        self.get_product(product_id).await
    }

    async fn lock_movement(
        conn: &mut sqlx::PgConnection,
        movement_id: Uuid,
    ) -> AppResult<MovementLock> {
        sqlx::query_as::<_, MovementLock>(
            r#"
            SELECT id, product_id, movement_type, quantity, unit_cost, status, notes,
                   sale_id, rental_order_id, quantity_before, average_cost_before
            FROM stock_movements
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(movement_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock movement".to_string()))
    }

    /// Correct the quantity or unit cost of an active entry
    pub async fn edit_entry(
        &self,
        movement_id: Uuid,
        input: EditEntryInput,
        user_name: &str,
    ) -> AppResult<StockMovement> {
        if input.quantity <= 0 {
            return Err(StockError::NonPositiveQuantity.into());
        }

        let mut tx = self.db.begin().await?;
        let movement = Self::lock_movement(&mut tx, movement_id).await?;
        if movement.movement_type != MovementType::Entry.as_str() {
            return Err(AppError::BusinessRule(
                "Only entry movements can be edited".to_string(),
            ));
        }
        if movement.status != MovementStatus::Active.as_str() {
            return Err(AppError::InvalidStateTransition(
                "Canceled movements cannot be edited".to_string(),
            ));
        }

        let product = stock::lock_product(&mut tx, movement.product_id).await?;
        let position = product.position().revise_entry(
            movement.quantity,
            movement.unit_cost,
            input.quantity,
            input.unit_cost,
            movement.before(),
        )?;
        stock::save_position(&mut tx, product.id, position).await?;

        sqlx::query("UPDATE stock_movements SET quantity = $2, unit_cost = $3 WHERE id = $1")
            .bind(movement.id)
            .bind(input.quantity)
            .bind(input.unit_cost)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut tx,
            "Entry edited",
            &format!(
                "{}: {} at {} -> {} at {}",
                product.name,
                movement.quantity,
                format_brl(movement.unit_cost),
                input.quantity,
                format_brl(input.unit_cost)
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_movement(movement_id).await
    }

    /// Cancel a standalone movement, reversing its effect on stock
    pub async fn cancel_movement(
        &self,
        movement_id: Uuid,
        input: CancelInput,
        user_name: &str,
    ) -> AppResult<StockMovement> {
        let reason = non_blank(input.reason.as_deref());

        let mut tx = self.db.begin().await?;
        let movement = Self::lock_movement(&mut tx, movement_id).await?;
        if movement.status == MovementStatus::Canceled.as_str() {
            return Err(AppError::InvalidStateTransition(
                "Movement is already canceled".to_string(),
            ));
        }
        if movement.sale_id.is_some() || movement.rental_order_id.is_some() {
            return Err(AppError::BusinessRule(
                "Movement belongs to a sale or rental order; cancel the document instead"
                    .to_string(),
            ));
        }

        let product = stock::lock_product(&mut tx, movement.product_id).await?;
        let position = match MovementType::from_str(&movement.movement_type) {
            Some(MovementType::Entry) => product
                .position()
                .revert_entry(movement.quantity, movement.unit_cost, movement.before())?,
            Some(_) => product.position().restore(movement.quantity)?,
            None => {
                return Err(AppError::Internal(format!(
                    "Unknown movement type {}",
                    movement.movement_type
                )))
            }
        };
        stock::save_position(&mut tx, product.id, position).await?;

        sqlx::query(
            r#"
            UPDATE stock_movements
            SET status = $2, cancellation_reason = $3, notes = $4
            WHERE id = $1
            "#,
        )
        .bind(movement.id)
        .bind(MovementStatus::Canceled.as_str())
        .bind(reason)
        .bind(canceled_note(movement.notes.as_deref(), None))
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            "Movement canceled",
            &format!(
                "{} x {} ({}){}",
                movement.quantity,
                product.name,
                movement.movement_type,
                reason.map(|r| format!(": {}", r)).unwrap_or_default()
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_movement(movement_id).await
    }

    pub async fn get_movement(&self, id: Uuid) -> AppResult<StockMovement> {
        sqlx::query_as::<_, StockMovement>(&format!("{} WHERE m.id = $1", MOVEMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock movement".to_string()))
    }

    pub async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<StockMovement>> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 1000);
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            r#"{}
            WHERE ($1::UUID IS NULL OR m.product_id = $1)
            ORDER BY m.moved_at DESC, m.created_at DESC
            LIMIT $2
            "#,
            MOVEMENT_SELECT
        ))
        .bind(filter.product_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(movements)
    }

    pub async fn export_rows(&self) -> AppResult<Vec<ProductExportRow>> {
        let products = self.list_products(&ProductFilter::default()).await?;
        Ok(products
            .into_iter()
            .map(|p| ProductExportRow {
                code: p.code,
                name: p.name,
                category: p.category.unwrap_or_default(),
                brand: p.brand.unwrap_or_default(),
                quantity: p.quantity,
                minimum: p.minimum,
                average_cost: format_brl(p.average_cost),
                sale_price: format_brl(p.sale_price),
                stock_value: format_brl(p.stock_value),
            })
            .collect())
    }
}

/// Stock value and units over the listed products
fn stock_totals(products: &[Product]) -> (Decimal, i64) {
    let value = products
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.stock_value))
        .unwrap_or(Decimal::MAX);
    let units = products.iter().map(|p| i64::from(p.quantity)).sum();
    (value.round_dp(2), units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_filter_all_disables() {
        let f = ProductFilter {
            brand: Some("All".to_string()),
            available_only: false,
        };
        assert_eq!(f.brand_pattern(), None);
        let f = ProductFilter {
            brand: Some(" hp ".to_string()),
            available_only: true,
        };
        assert_eq!(f.brand_pattern().as_deref(), Some("hp"));
    }

    #[test]
    fn test_adjust_input_accepts_brl_cost() {
        let input: AdjustStockInput = serde_json::from_str(
            r#"{"kind": "entry", "quantity": 3, "unit_cost": "R$ 1.250,00"}"#,
        )
        .unwrap();
        assert_eq!(input.unit_cost, Some(Decimal::new(125000, 2)));
        assert_eq!(input.kind, AdjustmentKind::Entry);
    }

    #[test]
    fn test_product_code_in_view() {
        let row = ProductRow {
            id: Uuid::new_v4(),
            product_number: 7,
            name: "Toner 26A".to_string(),
            category: None,
            brand: Some("HP".to_string()),
            compatibility: None,
            quantity: 4,
            minimum: 5,
            average_cost: Decimal::new(5, 0),
            sale_price: Decimal::ZERO,
            notes: None,
            last_movement_at: None,
            created_at: Utc::now(),
        };
        let product = Product::from(row);
        assert_eq!(product.code, "P007");
        assert_eq!(product.stock_value, Decimal::new(20, 0));
    }

    fn product(quantity: i32, average_cost: Decimal) -> Product {
        Product::from(ProductRow {
            id: Uuid::new_v4(),
            product_number: 1,
            name: "Cilindro".to_string(),
            category: None,
            brand: Some("Brother".to_string()),
            compatibility: None,
            quantity,
            minimum: 0,
            average_cost,
            sale_price: Decimal::ZERO,
            notes: None,
            last_movement_at: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_stock_totals_cover_only_listed_products() {
        let listed = vec![
            product(3, Decimal::new(1050, 2)),
            product(2, Decimal::new(3333333333, 10)),
        ];
        assert_eq!(stock_totals(&listed), (Decimal::new(3217, 2), 5));
        assert_eq!(stock_totals(&listed[..1]), (Decimal::new(3150, 2), 3));
        assert_eq!(stock_totals(&[]), (Decimal::ZERO, 0));
    }
}
