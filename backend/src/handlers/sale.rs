//! HTTP handlers for sales

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use shared::{Action, Resource, SaleTrackingUpdate};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{CancelSaleInput, CreateSaleInput, Sale, SaleDetail, SaleFilter};
use crate::services::{ReportingService, SaleService};
use crate::AppState;

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<Vec<Sale>>> {
    current_user.0.require(Resource::Sale, Action::View)?;
    let sales = SaleService::new(state.db)
        .list_sales(&filter, Utc::now().date_naive())
        .await?;
    Ok(Json(sales))
}

/// Unpaid sales with a due date
pub async fn due_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Sale>>> {
    current_user.0.require(Resource::Sale, Action::View)?;
    let sales = SaleService::new(state.db).due_sales(None).await?;
    Ok(Json(sales))
}

pub async fn canceled_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Sale>>> {
    current_user.0.require(Resource::Sale, Action::View)?;
    let sales = SaleService::new(state.db).canceled_sales().await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleDetail>> {
    current_user.0.require(Resource::Sale, Action::View)?;
    let sale = SaleService::new(state.db).get_sale(sale_id).await?;
    Ok(Json(sale))
}

pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    current_user.0.require(Resource::Sale, Action::Create)?;
    let sale = SaleService::new(state.db)
        .create_sale(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Payment, invoice, boleto and shipping tracking
pub async fn update_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(update): Json<SaleTrackingUpdate>,
) -> AppResult<Json<SaleDetail>> {
    current_user.0.require(Resource::Sale, Action::Edit)?;
    let sale = SaleService::new(state.db)
        .update_sale(sale_id, update, &current_user.0.name)
        .await?;
    Ok(Json(sale))
}

pub async fn cancel_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<CancelSaleInput>,
) -> AppResult<Json<SaleDetail>> {
    current_user.0.require(Resource::Sale, Action::Delete)?;
    let sale = SaleService::new(state.db)
        .cancel_sale(sale_id, input, &current_user.0.name)
        .await?;
    Ok(Json(sale))
}

/// Sales CSV download, same filters as the list
pub async fn export_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<impl IntoResponse> {
    current_user.0.require(Resource::Sale, Action::Export)?;
    let rows = SaleService::new(state.db)
        .export_rows(&filter, Utc::now().date_naive())
        .await?;
    let csv = ReportingService::export_to_csv(&rows)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"sales.csv\""),
        ],
        csv,
    ))
}
