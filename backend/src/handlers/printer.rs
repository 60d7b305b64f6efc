//! HTTP handlers for the printer fleet

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::printer::{
    EditMovementInput, MaintenanceLog, MaintenanceLogInput, MovePrinterInput, Printer,
    PrinterFilter, PrinterHistory, PrinterInput, PrinterMovement, PrinterOverview, TimelineEvent,
    WorkOrder,
};
use crate::services::PrinterService;
use crate::AppState;

/// Fleet list with status counts and the latest movements
pub async fn list_printers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<PrinterFilter>,
) -> AppResult<Json<PrinterOverview>> {
    current_user.0.require(Resource::Printer, Action::View)?;
    let overview = PrinterService::new(state.db).list_printers(&filter).await?;
    Ok(Json(overview))
}

pub async fn get_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
) -> AppResult<Json<Printer>> {
    current_user.0.require(Resource::Printer, Action::View)?;
    let printer = PrinterService::new(state.db).get_printer(printer_id).await?;
    Ok(Json(printer))
}

pub async fn create_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PrinterInput>,
) -> AppResult<(StatusCode, Json<Printer>)> {
    current_user.0.require(Resource::Printer, Action::Create)?;
    let printer = PrinterService::new(state.db)
        .create_printer(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(printer)))
}

pub async fn update_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
    Json(input): Json<PrinterInput>,
) -> AppResult<Json<Printer>> {
    current_user.0.require(Resource::Printer, Action::Edit)?;
    let printer = PrinterService::new(state.db)
        .update_printer(printer_id, input, &current_user.0.name)
        .await?;
    Ok(Json(printer))
}

pub async fn delete_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Printer, Action::Delete)?;
    PrinterService::new(state.db)
        .delete_printer(printer_id, &current_user.0.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a printer to a client, to maintenance or back to stock
pub async fn move_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
    Json(input): Json<MovePrinterInput>,
) -> AppResult<Json<Printer>> {
    current_user.0.require(Resource::Printer, Action::Edit)?;
    let printer = PrinterService::new(state.db)
        .move_printer(printer_id, input, &current_user.0.name)
        .await?;
    Ok(Json(printer))
}

pub async fn edit_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<EditMovementInput>,
) -> AppResult<Json<PrinterMovement>> {
    current_user.0.require(Resource::Printer, Action::Edit)?;
    let movement = PrinterService::new(state.db)
        .edit_movement(movement_id, input, &current_user.0.name)
        .await?;
    Ok(Json(movement))
}

pub async fn list_work_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
) -> AppResult<Json<Vec<WorkOrder>>> {
    current_user.0.require(Resource::Printer, Action::View)?;
    let orders = PrinterService::new(state.db).list_work_orders(printer_id).await?;
    Ok(Json(orders))
}

pub async fn add_maintenance_log(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(work_order_id): Path<Uuid>,
    Json(input): Json<MaintenanceLogInput>,
) -> AppResult<(StatusCode, Json<MaintenanceLog>)> {
    current_user.0.require(Resource::Printer, Action::Edit)?;
    let log = PrinterService::new(state.db)
        .add_maintenance_log(work_order_id, input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn printer_timeline(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
) -> AppResult<Json<Vec<TimelineEvent>>> {
    current_user.0.require(Resource::Printer, Action::View)?;
    let events = PrinterService::new(state.db).timeline(printer_id).await?;
    Ok(Json(events))
}

pub async fn printer_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(printer_id): Path<Uuid>,
) -> AppResult<Json<PrinterHistory>> {
    current_user.0.require(Resource::Printer, Action::View)?;
    let history = PrinterService::new(state.db).full_history(printer_id).await?;
    Ok(Json(history))
}
