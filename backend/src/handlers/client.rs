//! HTTP handlers for the client registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::client::{Client, ClientInput, RentedPrinter};
use crate::services::ClientService;
use crate::AppState;

pub async fn list_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Client>>> {
    current_user.0.require(Resource::Client, Action::View)?;
    let clients = ClientService::new(state.db).list().await?;
    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    current_user.0.require(Resource::Client, Action::View)?;
    let client = ClientService::new(state.db).get(client_id).await?;
    Ok(Json(client))
}

pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ClientInput>,
) -> AppResult<(StatusCode, Json<Client>)> {
    current_user.0.require(Resource::Client, Action::Create)?;
    let client = ClientService::new(state.db)
        .create(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
    Json(input): Json<ClientInput>,
) -> AppResult<Json<Client>> {
    current_user.0.require(Resource::Client, Action::Edit)?;
    let client = ClientService::new(state.db)
        .update(client_id, input, &current_user.0.name)
        .await?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Client, Action::Delete)?;
    ClientService::new(state.db)
        .delete(client_id, &current_user.0.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Printers currently at the client, for the rental order form
pub async fn rented_printers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Vec<RentedPrinter>>> {
    current_user.0.require(Resource::Client, Action::View)?;
    let printers = ClientService::new(state.db)
        .rented_printers(client_id)
        .await?;
    Ok(Json(printers))
}
