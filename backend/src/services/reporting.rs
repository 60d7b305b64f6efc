//! Reporting service: dashboard metrics, notifications and CSV export

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::{
    classify_stock, due_alert_cutoff, MonthPeriod, MovementStatus, MovementType, StockAttention,
};

use crate::error::{AppError, AppResult};
use crate::services::contract::ContractService;
use crate::services::product::{StockMovement, MOVEMENT_SELECT};
use crate::services::sale::{Sale, SaleService};
use crate::services::settings::SettingsService;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// A product at or near its minimum
#[derive(Debug, Clone, Serialize)]
pub struct AttentionItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub minimum: i32,
    pub level: StockAttention,
}

#[derive(Debug, FromRow)]
struct StockLevel {
    id: Uuid,
    name: String,
    quantity: i32,
    minimum: i32,
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_units: i64,
    pub attention: Vec<AttentionItem>,
    pub due_sales: Vec<Sale>,
    pub total_alerts: usize,
    pub units_out_this_month: i64,
    pub recent_entries: Vec<StockMovement>,
    pub recent_outflows: Vec<StockMovement>,
    pub contracts_monthly_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Notifications {
    pub attention: Vec<AttentionItem>,
    pub due_sales: Vec<Sale>,
    pub total: usize,
}

/// Classify every product and keep those needing attention, lowest stock first
fn attention_list(levels: Vec<StockLevel>, margin_pct: i32) -> Vec<AttentionItem> {
    let mut items: Vec<AttentionItem> = levels
        .into_iter()
        .filter_map(|p| {
            classify_stock(p.quantity, p.minimum, margin_pct).map(|level| AttentionItem {
                product_id: p.id,
                name: p.name,
                quantity: p.quantity,
                minimum: p.minimum,
                level,
            })
        })
        .collect();
    items.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
    items
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn attention(&self) -> AppResult<Vec<AttentionItem>> {
        let settings = SettingsService::new(self.db.clone()).get().await?;
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT id, name, quantity, minimum FROM products ORDER BY quantity, name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(attention_list(levels, settings.attention_margin_pct))
    }

    async fn due_sales(&self, today: NaiveDate) -> AppResult<Vec<Sale>> {
        let settings = SettingsService::new(self.db.clone()).get().await?;
        SaleService::new(self.db.clone())
            .due_sales(Some(due_alert_cutoff(today, settings.due_alert_days)))
            .await
    }

    /// Stock attention list and sales coming due
    pub async fn notifications(&self, today: NaiveDate) -> AppResult<Notifications> {
        let attention = self.attention().await?;
        let due_sales = self.due_sales(today).await?;
        Ok(Notifications {
            total: attention.len() + due_sales.len(),
            attention,
            due_sales,
        })
    }

    /// Get dashboard metrics
    pub async fn get_dashboard(&self, today: NaiveDate) -> AppResult<DashboardMetrics> {
        let Notifications {
            attention,
            due_sales,
            total,
        } = self.notifications(today).await?;

        let total_units =
            sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM products")
                .fetch_one(&self.db)
                .await?;

        let month = MonthPeriod::containing(today);
        let units_out_this_month = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM stock_movements
            WHERE movement_type = ANY($1)
              AND status = $2
              AND moved_at >= $3 AND moved_at < $4
            "#,
        )
        .bind(MovementType::outflows().to_vec())
        .bind(MovementStatus::Active.as_str())
        .bind(month.first_day().and_time(NaiveTime::MIN).and_utc())
        .bind(month.end_exclusive().and_time(NaiveTime::MIN).and_utc())
        .fetch_one(&self.db)
        .await?;

        let recent_entries = sqlx::query_as::<_, StockMovement>(&format!(
            "{} WHERE m.movement_type = $1 AND m.status = $2 ORDER BY m.moved_at DESC LIMIT 30",
            MOVEMENT_SELECT
        ))
        .bind(MovementType::Entry.as_str())
        .bind(MovementStatus::Active.as_str())
        .fetch_all(&self.db)
        .await?;

        let recent_outflows = sqlx::query_as::<_, StockMovement>(&format!(
            "{} WHERE m.movement_type = ANY($1) AND m.status = $2 ORDER BY m.moved_at DESC LIMIT 30",
            MOVEMENT_SELECT
        ))
        .bind(MovementType::outflows().to_vec())
        .bind(MovementStatus::Active.as_str())
        .fetch_all(&self.db)
        .await?;

        let contracts_monthly_total = ContractService::new(self.db.clone())
            .active_monthly_total()
            .await?;

        Ok(DashboardMetrics {
            total_units,
            attention,
            due_sales,
            total_alerts: total,
            units_out_this_month,
            recent_entries,
            recent_outflows,
            contracts_monthly_total,
        })
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(name: &str, quantity: i32, minimum: i32) -> StockLevel {
        StockLevel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            minimum,
        }
    }

    #[test]
    fn test_attention_list_filters_and_sorts() {
        let items = attention_list(
            vec![
                level("Toner A", 6, 5),
                level("Toner B", 2, 5),
                level("Drum", 50, 5),
                level("Fuser", 5, 5),
            ],
            20,
        );
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Toner B", "Fuser", "Toner A"]);
        assert_eq!(items[0].level, StockAttention::Critical);
        assert_eq!(items[2].level, StockAttention::Low);
    }

    #[test]
    fn test_export_to_csv_writes_header() {
        #[derive(Serialize)]
        struct Row {
            code: &'static str,
            quantity: i32,
        }
        let csv = ReportingService::export_to_csv(&[Row {
            code: "P001",
            quantity: 3,
        }])
        .unwrap();
        assert_eq!(csv, "code,quantity\nP001,3\n");
    }
}
