//! HTTP handlers for suppliers and purchase orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase::{
    DeliverOrderInput, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderInput, Supplier,
    SupplierInput,
};
use crate::services::PurchaseService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderQuery {
    pub supplier_id: Option<Uuid>,
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    current_user.0.require(Resource::Supplier, Action::View)?;
    let suppliers = PurchaseService::new(state.db).list_suppliers().await?;
    Ok(Json(suppliers))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require(Resource::Supplier, Action::View)?;
    let supplier = PurchaseService::new(state.db).get_supplier(supplier_id).await?;
    Ok(Json(supplier))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    current_user.0.require(Resource::Supplier, Action::Create)?;
    let supplier = PurchaseService::new(state.db)
        .create_supplier(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<SupplierInput>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require(Resource::Supplier, Action::Edit)?;
    let supplier = PurchaseService::new(state.db)
        .update_supplier(supplier_id, input, &current_user.0.name)
        .await?;
    Ok(Json(supplier))
}

/// Removes the supplier together with its purchase orders
pub async fn delete_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Supplier, Action::Delete)?;
    PurchaseService::new(state.db)
        .delete_supplier(supplier_id, &current_user.0.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PurchaseOrderQuery>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    current_user.0.require(Resource::PurchaseOrder, Action::View)?;
    let orders = PurchaseService::new(state.db)
        .list_orders(query.supplier_id)
        .await?;
    Ok(Json(orders))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    current_user.0.require(Resource::PurchaseOrder, Action::View)?;
    let order = PurchaseService::new(state.db).get_order(order_id).await?;
    Ok(Json(order))
}

pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrderDetail>)> {
    current_user.0.require(Resource::PurchaseOrder, Action::Create)?;
    let order = PurchaseService::new(state.db)
        .save_order(None, input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<PurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    current_user.0.require(Resource::PurchaseOrder, Action::Edit)?;
    let order = PurchaseService::new(state.db)
        .save_order(Some(order_id), input, &current_user.0.name)
        .await?;
    Ok(Json(order))
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    current_user.0.require(Resource::PurchaseOrder, Action::Delete)?;
    let order = PurchaseService::new(state.db)
        .cancel_order(order_id, &current_user.0.name)
        .await?;
    Ok(Json(order))
}

pub async fn deliver_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<DeliverOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    current_user.0.require(Resource::PurchaseOrder, Action::Edit)?;
    let order = PurchaseService::new(state.db)
        .deliver_order(order_id, input, &current_user.0.name)
        .await?;
    Ok(Json(order))
}
