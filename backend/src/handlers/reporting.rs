//! Reporting handlers for the dashboard and the alert bell

use axum::{extract::State, Json};
use chrono::Utc;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::{DashboardMetrics, Notifications, ReportingService};
use crate::AppState;

/// Get dashboard metrics
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    current_user.0.require(Resource::Report, Action::View)?;
    let metrics = ReportingService::new(state.db)
        .get_dashboard(Utc::now().date_naive())
        .await?;
    Ok(Json(metrics))
}

/// Low stock and sales coming due
pub async fn get_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Notifications>> {
    current_user.0.require(Resource::Stock, Action::View)?;
    let notifications = ReportingService::new(state.db)
        .notifications(Utc::now().date_naive())
        .await?;
    Ok(Json(notifications))
}
