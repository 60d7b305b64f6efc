//! Error handling for PrintControl
//!
//! Provides consistent error responses in English and Portuguese

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::{
    AmountOverflow, BillingError, LedgerError, PrinterRuleError, SaleRuleError, StockError,
};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_pt: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_pt: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field validation error
    pub fn field(field: &str, message: &str, message_pt: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_pt: message_pt.to_string(),
        }
    }

    /// Map a unique-constraint violation to a duplicate error on `field`
    pub fn from_unique(err: sqlx::Error, field: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry(field.to_string())
            }
            _ => AppError::DatabaseError(err),
        }
    }

    /// Map a foreign-key violation to `conflict`
    pub fn from_foreign_key(err: sqlx::Error, conflict: impl FnOnce() -> AppError) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => conflict(),
            _ => AppError::DatabaseError(err),
        }
    }

    fn is_server_fault(&self) -> bool {
        matches!(self, AppError::DatabaseError(_) | AppError::Internal(_))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: String, message_pt: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_pt,
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_CREDENTIALS",
                    "Invalid email or password".to_string(),
                    "E-mail ou senha inválidos".to_string(),
                ),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_TOKEN",
                    "Invalid token".to_string(),
                    "Token inválido".to_string(),
                ),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action".to_string(),
                    "Você não tem permissão para executar esta ação".to_string(),
                ),
            ),
            AppError::Unauthorized {
                message,
                message_pt,
            } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_pt.clone()),
            ),
            AppError::Validation {
                field,
                message,
                message_pt,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_pt.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Dados inválidos: {}", msg),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                        format!("Já existe um registro com este {}", field),
                    )
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_pt,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("CONFLICT", message.clone(), message_pt.clone())
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} não encontrado", resource),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    format!("Não é possível alterar o status: {}", msg),
                ),
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    msg.clone(),
                    format!("Estoque insuficiente: {}", msg),
                ),
            ),
            AppError::BusinessRule(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "BUSINESS_RULE_VIOLATION",
                    msg.clone(),
                    format!("Operação não permitida: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "Ocorreu um erro no banco de dados".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Erro interno do servidor".to_string(),
                ),
            ),
        };

        if self.is_server_fault() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient { .. } => AppError::InsufficientStock(err.to_string()),
            StockError::NonPositiveQuantity => {
                AppError::field("quantity", &err.to_string(), "A quantidade deve ser positiva")
            }
            StockError::NonPositiveCost => AppError::BusinessRule(err.to_string()),
            StockError::Overflow | StockError::ValueOverflow => {
                AppError::ValidationError(err.to_string())
            }
        }
    }
}

impl From<AmountOverflow> for AppError {
    fn from(err: AmountOverflow) -> Self {
        AppError::field("amount", &err.to_string(), "Valor muito alto")
    }
}

impl From<SaleRuleError> for AppError {
    fn from(err: SaleRuleError) -> Self {
        match err {
            SaleRuleError::InvoiceNumberRequired => AppError::field(
                "invoice_number",
                &err.to_string(),
                "Informe o número da NF",
            ),
            SaleRuleError::SaleCanceled => AppError::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<PrinterRuleError> for AppError {
    fn from(err: PrinterRuleError) -> Self {
        match err {
            PrinterRuleError::ClientRequired => AppError::field(
                "client_id",
                &err.to_string(),
                "Selecione o cliente da locação",
            ),
            PrinterRuleError::CounterDecreased { .. } => AppError::BusinessRule(err.to_string()),
            PrinterRuleError::WorkOrderAlreadyOpen => {
                AppError::InvalidStateTransition(err.to_string())
            }
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidBillingDay => AppError::field(
                "billing_day",
                &err.to_string(),
                "O dia de faturamento deve estar entre 1 e 28",
            ),
            BillingError::NegativeTerms | BillingError::AmountTooLarge => {
                AppError::ValidationError(err.to_string())
            }
            BillingError::NoPrinters | BillingError::ReadingBelowBaseline { .. } => {
                AppError::BusinessRule(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount => AppError::field(
                "amount",
                &err.to_string(),
                "O valor deve ser maior que zero",
            ),
            LedgerError::InvalidTransition(..) => AppError::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation {
                message_pt: format!("Valor inválido para {}", field),
                field,
                message,
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_shortage_is_unprocessable() {
        let err: AppError = StockError::Insufficient {
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_oversized_amounts_are_bad_request() {
        let err: AppError = StockError::ValueOverflow.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        let err: AppError = AmountOverflow.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_foreign_key_mapping_passes_other_errors_through() {
        let err = AppError::from_foreign_key(sqlx::Error::RowNotFound, || {
            AppError::DuplicateEntry("unused".into())
        });
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[test]
    fn test_invoice_rule_is_bad_request() {
        let err: AppError = SaleRuleError::InvoiceNumberRequired.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_and_conflict_status() {
        assert_eq!(
            AppError::NotFound("Product".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DuplicateEntry("serial".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
