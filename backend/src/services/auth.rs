//! Authentication service for operator accounts and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{permission_strings, Role};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Input for creating an operator account
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<Role>,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub name: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    password_hash: String,
    role: String,
    is_active: bool,
}

/// Operator account as returned by the API
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Create the first administrator. Refused once any account exists.
    pub async fn register_first_admin(&self, input: CreateUserInput) -> AppResult<AuthTokens> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        // Self-conflicting lock: concurrent bootstraps queue here
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        registration_open(existing)?;

        let account = Self::insert_user(
            &mut tx,
            &input.name,
            &input.email,
            &input.password,
            Role::Admin,
        )
        .await?;
        tx.commit().await?;
        tracing::info!(user = %account.id, "Bootstrap administrator created");

        let tokens = self.generate_tokens(account.id, &account.name, Role::Admin)?;
        self.store_refresh_token(account.id, &tokens.refresh_token).await?;
        Ok(tokens)
    }

    /// Create an operator account (admin only)
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<UserAccount> {
        input.validate()?;
        let role = input.role.unwrap_or(Role::Operator);
        let mut conn = self.db.acquire().await?;
        let account =
            Self::insert_user(&mut conn, &input.name, &input.email, &input.password, role).await?;
        tracing::info!(user = %account.id, role = role.as_str(), "User created");
        Ok(account)
    }

    pub async fn list_users(&self) -> AppResult<Vec<UserAccount>> {
        let users = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, name, email, role, is_active, last_login_at, created_at
            FROM users
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn insert_user(
        conn: &mut PgConnection,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> AppResult<UserAccount> {
        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        sqlx::query_as::<_, UserAccount>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, LOWER($2), $3, $4)
            RETURNING id, name, email, role, is_active, last_login_at, created_at
            "#,
        )
        .bind(name.trim())
        .bind(email.trim())
        .bind(&password_hash)
        .bind(role.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::from_unique(e, "email"))
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, password_hash, role, is_active
            FROM users
            WHERE email = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AppError::Unauthorized {
                message: "Account is disabled".to_string(),
                message_pt: "Conta desativada".to_string(),
            });
        }

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(user = %user.id, "Failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let role = Role::from_str(&user.role).unwrap_or(Role::Operator);
        let tokens = self.generate_tokens(user.id, &user.name, role)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Exchange a refresh token for a new token pair, revoking the old one
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = Self::hash_token(refresh_token);

        let mut tx = self.db.begin().await?;

        let (user_id, name, role) = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE u.id = rt.user_id
              AND rt.token_hash = $1
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.is_active = true
            RETURNING rt.user_id, u.name, u.role
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid or expired refresh token".to_string(),
            message_pt: "Token de atualização inválido ou expirado".to_string(),
        })?;

        let role = Role::from_str(&role).unwrap_or(Role::Operator);
        let tokens = self.generate_tokens(user_id, &name, role)?;

        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(Self::hash_token(&tokens.refresh_token))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tokens)
    }

    /// Decode and validate an access token
    pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized {
            message: format!("Invalid token: {}", e),
            message_pt: "Token inválido".to_string(),
        })
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user_id: Uuid, name: &str, role: Role) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let access_claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            role: role.as_str().to_string(),
            permissions: permission_strings(role),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        // Opaque refresh token; only its hash is stored
        let refresh_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let token_hash = Self::hash_token(token);
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Hash a token for storage
    fn hash_token(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }
}

/// Self-registration only bootstraps the first account
fn registration_open(existing_users: i64) -> AppResult<()> {
    if existing_users > 0 {
        return Err(AppError::Conflict {
            resource: "user".to_string(),
            message: "Registration is closed; ask an administrator for an account".to_string(),
            message_pt: "Cadastro encerrado; solicite uma conta a um administrador".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_closes_after_first_user() {
        assert!(registration_open(0).is_ok());
        assert!(matches!(
            registration_open(1),
            Err(AppError::Conflict { .. })
        ));
    }

    #[test]
    fn test_token_hash_is_stable_hex() {
        let a = AuthService::hash_token("abc");
        assert_eq!(a, AuthService::hash_token("abc"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, AuthService::hash_token("abd"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(AuthService::decode_token("not-a-jwt", "secret").is_err());
    }

    #[test]
    fn test_claims_round_trip_through_jwt() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            name: "Ana".to_string(),
            role: "operator".to_string(),
            permissions: permission_strings(Role::Operator),
            exp: (Utc::now() + Duration::seconds(60)).timestamp(),
            iat: Utc::now().timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let decoded = AuthService::decode_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, "operator");
        assert!(AuthService::decode_token(&token, "other").is_err());
    }
}
