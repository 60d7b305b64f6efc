//! HTTP handlers for bank accounts and receivables/payables

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
use crate::services::finance::{
    AccountStatement, BankAccount, CreateAccountInput, EntryFilter, FinanceSummary, LedgerEntry,
    ManualEntryInput, SettleInput, UpdateAccountInput,
};
use crate::services::FinanceService;
use crate::AppState;

pub async fn list_accounts(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<BankAccount>>> {
    current_user.0.require(Resource::Finance, Action::View)?;
    let accounts = FinanceService::new(state.db).list_accounts().await?;
    Ok(Json(accounts))
}

pub async fn create_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAccountInput>,
) -> AppResult<(StatusCode, Json<BankAccount>)> {
    current_user.0.require(Resource::Finance, Action::Create)?;
    let account = FinanceService::new(state.db)
        .create_account(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(account_id): Path<Uuid>,
    Json(input): Json<UpdateAccountInput>,
) -> AppResult<Json<BankAccount>> {
    current_user.0.require(Resource::Finance, Action::Edit)?;
    let account = FinanceService::new(state.db)
        .update_account(account_id, input, &current_user.0.name)
        .await?;
    Ok(Json(account))
}

pub async fn account_statement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<AccountStatement>> {
    current_user.0.require(Resource::Finance, Action::View)?;
    let statement = FinanceService::new(state.db).statement(account_id).await?;
    Ok(Json(statement))
}

pub async fn list_entries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<EntryFilter>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    current_user.0.require(Resource::Finance, Action::View)?;
    let entries = FinanceService::new(state.db)
        .list_entries(&filter, Utc::now().date_naive())
        .await?;
    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<LedgerEntry>> {
    current_user.0.require(Resource::Finance, Action::View)?;
    let entry = FinanceService::new(state.db)
        .get_entry(entry_id, Utc::now().date_naive())
        .await?;
    Ok(Json(entry))
}

/// Manual receivable or payable
pub async fn create_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ManualEntryInput>,
) -> AppResult<(StatusCode, Json<LedgerEntry>)> {
    current_user.0.require(Resource::Finance, Action::Create)?;
    let entry = FinanceService::new(state.db)
        .create_manual(input, &current_user.0.name)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn settle_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
    Json(input): Json<SettleInput>,
) -> AppResult<Json<LedgerEntry>> {
    current_user.0.require(Resource::Finance, Action::Edit)?;
    let entry = FinanceService::new(state.db)
        .settle(entry_id, input, &current_user.0.name)
        .await?;
    Ok(Json(entry))
}

pub async fn reopen_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<LedgerEntry>> {
    current_user.0.require(Resource::Finance, Action::Edit)?;
    let entry = FinanceService::new(state.db)
        .reopen(entry_id, &current_user.0.name)
        .await?;
    Ok(Json(entry))
}

pub async fn cancel_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<LedgerEntry>> {
    current_user.0.require(Resource::Finance, Action::Delete)?;
    let entry = FinanceService::new(state.db)
        .cancel(entry_id, &current_user.0.name)
        .await?;
    Ok(Json(entry))
}

pub async fn finance_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<FinanceSummary>> {
    current_user.0.require(Resource::Finance, Action::View)?;
    let summary = FinanceService::new(state.db)
        .summary(Utc::now().date_naive())
        .await?;
    Ok(Json(summary))
}
