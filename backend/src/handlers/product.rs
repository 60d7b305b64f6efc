//! HTTP handlers for products and stock movements

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::product::{
    AdjustStockInput, CancelInput, EditEntryInput, MovementFilter, Product, ProductFilter,
    ProductInput, StockMovement, StockOverview,
};
use crate::services::{ProductService, ReportingService};
use crate::AppState;

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    current_user.0.require(Resource::Product, Action::View)?;
    let products = ProductService::new(state.db).list_products(&filter).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    current_user.0.require(Resource::Product, Action::View)?;
    let product = ProductService::new(state.db).get_product(product_id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    current_user.0.require(Resource::Product, Action::Create)?;
    let product = ProductService::new(state.db)
        .create_product(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require(Resource::Product, Action::Edit)?;
    let product = ProductService::new(state.db)
        .update_product(product_id, input, &current_user.0.name)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Product, Action::Delete)?;
    ProductService::new(state.db)
        .delete_product(product_id, &current_user.0.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Products CSV download
pub async fn export_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    current_user.0.require(Resource::Product, Action::Export)?;
    let rows = ProductService::new(state.db).export_rows().await?;
    let csv = ReportingService::export_to_csv(&rows)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"products.csv\""),
        ],
        csv,
    ))
}

/// Stock screen: products, totals, rankings and recent movements
pub async fn stock_overview(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<StockOverview>> {
    current_user.0.require(Resource::Stock, Action::View)?;
    let overview = ProductService::new(state.db).stock_overview(&filter).await?;
    Ok(Json(overview))
}

/// Manual entry or exit
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require(Resource::Stock, Action::Create)?;
    let product = ProductService::new(state.db)
        .adjust_stock(product_id, input, &current_user.0.name)
        .await?;
    Ok(Json(product))
}

pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<Vec<StockMovement>>> {
    current_user.0.require(Resource::Stock, Action::View)?;
    let movements = ProductService::new(state.db).list_movements(&filter).await?;
    Ok(Json(movements))
}

pub async fn get_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<StockMovement>> {
    current_user.0.require(Resource::Stock, Action::View)?;
    let movement = ProductService::new(state.db).get_movement(movement_id).await?;
    Ok(Json(movement))
}

/// Change quantity and cost of an entry
pub async fn edit_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<EditEntryInput>,
) -> AppResult<Json<StockMovement>> {
    current_user.0.require(Resource::Stock, Action::Edit)?;
    let movement = ProductService::new(state.db)
        .edit_entry(movement_id, input, &current_user.0.name)
        .await?;
    Ok(Json(movement))
}

pub async fn cancel_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<CancelInput>,
) -> AppResult<Json<StockMovement>> {
    current_user.0.require(Resource::Stock, Action::Delete)?;
    let movement = ProductService::new(state.db)
        .cancel_movement(movement_id, input, &current_user.0.name)
        .await?;
    Ok(Json(movement))
}
