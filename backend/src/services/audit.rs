//! Persistent audit trail of business actions (system log)

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

/// Entries returned by [`AuditService::list_recent`]
const RECENT_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemLogEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub action: String,
    pub details: String,
    pub user_name: String,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Last entries, newest first
    pub async fn list_recent(&self) -> AppResult<Vec<SystemLogEntry>> {
        let entries = sqlx::query_as::<_, SystemLogEntry>(
            r#"
            SELECT id, logged_at, action, details, user_name
            FROM system_logs
            ORDER BY logged_at DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_LIMIT)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }
}

/// Record an action inside the caller's transaction
pub async fn record(
    conn: &mut PgConnection,
    action: &str,
    details: &str,
    user_name: &str,
) -> AppResult<()> {
    sqlx::query("INSERT INTO system_logs (action, details, user_name) VALUES ($1, $2, $3)")
        .bind(action)
        .bind(details)
        .bind(user_name)
        .execute(conn)
        .await?;
    tracing::info!(action, user = user_name, "{}", details);
    Ok(())
}
