//! HTTP handlers for business settings and the system log

use axum::{extract::State, Json};

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::audit::SystemLogEntry;
use crate::services::settings::{Settings, UpdateSettingsInput};
use crate::services::{AuditService, SettingsService};
use crate::AppState;

pub async fn get_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Settings>> {
    current_user.0.require(Resource::Settings, Action::View)?;
    let settings = SettingsService::new(state.db).get().await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateSettingsInput>,
) -> AppResult<Json<Settings>> {
    current_user.0.require(Resource::Settings, Action::Edit)?;
    let settings = SettingsService::new(state.db)
        .update(input, &current_user.0.name)
        .await?;
    Ok(Json(settings))
}

/// Latest system log entries
pub async fn list_logs(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<SystemLogEntry>>> {
    current_user.0.require(Resource::Settings, Action::View)?;
    let logs = AuditService::new(state.db).list_recent().await?;
    Ok(Json(logs))
}
