//! Authentication middleware
//!
//! JWT authentication and role-based access control

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use shared::{Action, Resource, Role};

use crate::error::{AppError, AppResult};
use crate::services::AuthService;
use crate::AppState;

/// Authenticated operator extracted from the access token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = format!("{}:{}", resource.as_str(), action.as_str());
        self.permissions.contains(&permission)
    }

    /// Fail with 403 unless the user has the permission
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::warn!(
                user = %self.user_id,
                "Permission denied: requires {}:{}",
                resource.as_str(),
                action.as_str()
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Validates the bearer token and stores the [`AuthUser`] in the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return AppError::Unauthorized {
            message: "Missing or invalid Authorization header".to_string(),
            message_pt: "Cabeçalho Authorization ausente ou inválido".to_string(),
        }
        .into_response();
    };

    let claims = match AuthService::decode_token(bearer.token(), &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return AppError::InvalidToken.into_response(),
    };

    let Some(role) = Role::from_str(&claims.role) else {
        return AppError::InvalidToken.into_response();
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        name: claims.name,
        role,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_pt: "É necessário fazer login".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            name: "Ana".to_string(),
            role,
            permissions: shared::permission_strings(role),
        }
    }

    #[test]
    fn test_operator_blocked_from_user_management() {
        let op = user(Role::Operator);
        assert!(op.require(Resource::Sale, Action::Create).is_ok());
        assert!(op.require(Resource::User, Action::Create).is_err());
        assert!(op.require(Resource::Settings, Action::Edit).is_err());
    }

    #[test]
    fn test_admin_allowed_everywhere() {
        let admin = user(Role::Admin);
        assert!(admin.require(Resource::User, Action::Create).is_ok());
        assert!(admin.require(Resource::Settings, Action::Edit).is_ok());
    }
}
