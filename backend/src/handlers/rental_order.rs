//! HTTP handlers for rental orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::rental_order::{
    CancelOrderInput, RentalOrder, RentalOrderDetail, RentalOrderFilter, RentalOrderInput,
    TopClient,
};
use crate::services::RentalOrderService;
use crate::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RentalOrderFilter>,
) -> AppResult<Json<Vec<RentalOrder>>> {
    current_user.0.require(Resource::RentalOrder, Action::View)?;
    let orders = RentalOrderService::new(state.db)
        .list_orders(&filter, Utc::now().date_naive())
        .await?;
    Ok(Json(orders))
}

pub async fn top_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<TopClient>>> {
    current_user.0.require(Resource::RentalOrder, Action::View)?;
    let clients = RentalOrderService::new(state.db)
        .top_clients(Utc::now().date_naive())
        .await?;
    Ok(Json(clients))
}

/// Order detail, also used by the printable view
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<RentalOrderDetail>> {
    current_user.0.require(Resource::RentalOrder, Action::View)?;
    let order = RentalOrderService::new(state.db).get_order(order_id).await?;
    Ok(Json(order))
}

pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RentalOrderInput>,
) -> AppResult<(StatusCode, Json<RentalOrderDetail>)> {
    current_user.0.require(Resource::RentalOrder, Action::Create)?;
    let order = RentalOrderService::new(state.db)
        .create_order(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn edit_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RentalOrderInput>,
) -> AppResult<Json<RentalOrderDetail>> {
    current_user.0.require(Resource::RentalOrder, Action::Edit)?;
    let order = RentalOrderService::new(state.db)
        .edit_order(order_id, input, &current_user.0.name)
        .await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<RentalOrderDetail>> {
    current_user.0.require(Resource::RentalOrder, Action::Delete)?;
    let order = RentalOrderService::new(state.db)
        .cancel_order(order_id, input, &current_user.0.name)
        .await?;
    Ok(Json(order))
}
