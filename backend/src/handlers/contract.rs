//! HTTP handlers for rental contracts and their monthly billings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{Action, ContractStatus, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::contract::{
    AttachPrinterInput, BillingDetail, Contract, ContractBilling, ContractDetail, ContractInput,
    IssueBillingInput, PeriodQuery, Profitability,
};
use crate::services::ContractService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContractQuery {
    pub status: Option<ContractStatus>,
}

pub async fn list_contracts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ContractQuery>,
) -> AppResult<Json<Vec<Contract>>> {
    current_user.0.require(Resource::Contract, Action::View)?;
    let contracts = ContractService::new(state.db).list(query.status).await?;
    Ok(Json(contracts))
}

pub async fn get_contract(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<ContractDetail>> {
    current_user.0.require(Resource::Contract, Action::View)?;
    let contract = ContractService::new(state.db).get(contract_id).await?;
    Ok(Json(contract))
}

pub async fn create_contract(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ContractInput>,
) -> AppResult<(StatusCode, Json<ContractDetail>)> {
    current_user.0.require(Resource::Contract, Action::Create)?;
    let contract = ContractService::new(state.db)
        .create(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(contract)))
}

pub async fn update_contract(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
    Json(input): Json<ContractInput>,
) -> AppResult<Json<ContractDetail>> {
    current_user.0.require(Resource::Contract, Action::Edit)?;
    let contract = ContractService::new(state.db)
        .update(contract_id, input, &current_user.0.name)
        .await?;
    Ok(Json(contract))
}

pub async fn attach_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
    Json(input): Json<AttachPrinterInput>,
) -> AppResult<Json<ContractDetail>> {
    current_user.0.require(Resource::Contract, Action::Edit)?;
    let contract = ContractService::new(state.db)
        .attach_printer(contract_id, input, &current_user.0.name)
        .await?;
    Ok(Json(contract))
}

pub async fn detach_printer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((contract_id, printer_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ContractDetail>> {
    current_user.0.require(Resource::Contract, Action::Edit)?;
    let contract = ContractService::new(state.db)
        .detach_printer(contract_id, printer_id, &current_user.0.name)
        .await?;
    Ok(Json(contract))
}

pub async fn list_billings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<Vec<ContractBilling>>> {
    current_user.0.require(Resource::Contract, Action::View)?;
    let billings = ContractService::new(state.db).list_billings(contract_id).await?;
    Ok(Json(billings))
}

/// Bill one month from the submitted counter readings
pub async fn issue_billing(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
    Json(input): Json<IssueBillingInput>,
) -> AppResult<(StatusCode, Json<BillingDetail>)> {
    current_user.0.require(Resource::Contract, Action::Create)?;
    let billing = ContractService::new(state.db)
        .issue_billing(contract_id, input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(billing)))
}

pub async fn get_billing(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(billing_id): Path<Uuid>,
) -> AppResult<Json<BillingDetail>> {
    current_user.0.require(Resource::Contract, Action::View)?;
    let billing = ContractService::new(state.db).get_billing(billing_id).await?;
    Ok(Json(billing))
}

pub async fn void_billing(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(billing_id): Path<Uuid>,
) -> AppResult<Json<BillingDetail>> {
    current_user.0.require(Resource::Contract, Action::Delete)?;
    let billing = ContractService::new(state.db)
        .void_billing(billing_id, &current_user.0.name)
        .await?;
    Ok(Json(billing))
}

pub async fn contract_profitability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(contract_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Profitability>> {
    current_user.0.require(Resource::Report, Action::View)?;
    let report = ContractService::new(state.db)
        .profitability(contract_id, &query)
        .await?;
    Ok(Json(report))
}
