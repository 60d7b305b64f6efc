//! Runtime business settings (single row)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use validator::Validate;

use crate::error::AppResult;
use crate::services::audit;

#[derive(Clone)]
pub struct SettingsService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Settings {
    pub attention_margin_pct: i32,
    pub due_alert_days: i32,
    pub last_rental_order_number: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsInput {
    #[validate(range(min = 0, max = 500, message = "Margin must be between 0 and 500"))]
    pub attention_margin_pct: i32,
    #[validate(range(min = 0, max = 365, message = "Alert window must be between 0 and 365 days"))]
    pub due_alert_days: i32,
}

impl SettingsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self) -> AppResult<Settings> {
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            SELECT attention_margin_pct, due_alert_days, last_rental_order_number, updated_at
            FROM settings
            WHERE id = 1
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(settings)
    }

    pub async fn update(&self, input: UpdateSettingsInput, user_name: &str) -> AppResult<Settings> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            UPDATE settings
            SET attention_margin_pct = $1, due_alert_days = $2, updated_at = NOW()
            WHERE id = 1
            RETURNING attention_margin_pct, due_alert_days, last_rental_order_number, updated_at
            "#,
        )
        .bind(input.attention_margin_pct)
        .bind(input.due_alert_days)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            "Settings updated",
            &format!(
                "Attention margin {}%, due alert window {} days",
                settings.attention_margin_pct, settings.due_alert_days
            ),
            user_name,
        )
        .await?;
        tx.commit().await?;

        Ok(settings)
    }
}

/// Take the next rental order number. The row lock serializes concurrent orders.
pub async fn next_rental_order_number(conn: &mut PgConnection) -> AppResult<i64> {
    let number = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE settings
        SET last_rental_order_number = last_rental_order_number + 1
        WHERE id = 1
        RETURNING last_rental_order_number
        "#,
    )
    .fetch_one(conn)
    .await?;
    Ok(number)
}
