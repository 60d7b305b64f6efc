//! Authentication and account handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthTokens, CreateUserInput, UserAccount};
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.login(&body.email, &body.password).await?;
    Ok(Json(tokens))
}

/// Create the first administrator of a fresh installation
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<AuthTokens>)> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.register_first_admin(body).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh_token(&body.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<UserAccount>>> {
    current_user.0.require(Resource::User, Action::View)?;
    let users = AuthService::new(state.db.clone(), &state.config)
        .list_users()
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<UserAccount>)> {
    current_user.0.require(Resource::User, Action::Create)?;
    let user = AuthService::new(state.db.clone(), &state.config)
        .create_user(input)
        .await?;
    tracing::info!(created_by = %current_user.0.user_id, user = %user.id, "Account created");
    Ok((StatusCode::CREATED, Json(user)))
}
