//! Client registry service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{rented_printer_label, validate_document, PersonType, PrinterStatus};

use crate::error::{AppError, AppResult};
use crate::services::audit;

#[derive(Clone)]
pub struct ClientService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub person_type: Option<String>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub closing_day: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create and full-replace update share one input
#[derive(Debug, Deserialize, Validate)]
pub struct ClientInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub person_type: Option<PersonType>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub closing_day: Option<String>,
    pub notes: Option<String>,
}

/// A printer currently rented by the client
#[derive(Debug, Clone, Serialize)]
pub struct RentedPrinter {
    pub id: Uuid,
    pub label: String,
    pub counter: i64,
}

#[derive(Debug, FromRow)]
struct RentedPrinterRow {
    id: Uuid,
    model: String,
    serial: String,
    mlt: Option<String>,
    counter: i64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ClientInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        if self.name.trim().is_empty() {
            return Err(AppError::field("name", "Name is required", "Informe o nome"));
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !validator::validate_email(email.trim()) {
                return Err(AppError::field(
                    "email",
                    "Invalid email format",
                    "E-mail inválido",
                ));
            }
        }
        if let (Some(kind), Some(doc)) = (
            self.person_type,
            self.document.as_deref().filter(|d| !d.trim().is_empty()),
        ) {
            validate_document(kind, doc).map_err(|msg| {
                AppError::field(
                    "document",
                    msg,
                    &format!("{} inválido", kind.document_label()),
                )
            })?;
        }
        Ok(())
    }
}

impl ClientService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, name, person_type, document, address, phone, email, closing_day,
                   notes, created_at, updated_at
            FROM clients
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(clients)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, name, person_type, document, address, phone, email, closing_day,
                   notes, created_at, updated_at
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    pub async fn create(&self, input: ClientInput, user_name: &str) -> AppResult<Client> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (name, person_type, document, address, phone, email, closing_day, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, person_type, document, address, phone, email, closing_day,
                      notes, created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.person_type.map(|p| p.as_str()))
        .bind(non_blank(input.document))
        .bind(non_blank(input.address))
        .bind(non_blank(input.phone))
        .bind(non_blank(input.email))
        .bind(non_blank(input.closing_day))
        .bind(non_blank(input.notes))
        .fetch_one(&mut *tx)
        .await?;

        audit::record(&mut tx, "New client", &client.name, user_name).await?;
        tx.commit().await?;
        Ok(client)
    }

    pub async fn update(&self, id: Uuid, input: ClientInput, user_name: &str) -> AppResult<Client> {
        input.check()?;

        let mut tx = self.db.begin().await?;
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = $2, person_type = $3, document = $4, address = $5, phone = $6,
                email = $7, closing_day = $8, notes = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, person_type, document, address, phone, email, closing_day,
                      notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.person_type.map(|p| p.as_str()))
        .bind(non_blank(input.document))
        .bind(non_blank(input.address))
        .bind(non_blank(input.phone))
        .bind(non_blank(input.email))
        .bind(non_blank(input.closing_day))
        .bind(non_blank(input.notes))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))?;

        audit::record(&mut tx, "Client updated", &client.name, user_name).await?;
        tx.commit().await?;
        Ok(client)
    }

    /// Delete a client with no history
    pub async fn delete(&self, id: Uuid, user_name: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        // Blocks inserts that reference the client until commit
        let name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM clients WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))?;

        let (orders, sales, contracts) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM rental_orders WHERE client_id = $1),
                (SELECT COUNT(*) FROM sales WHERE client_id = $1),
                (SELECT COUNT(*) FROM contracts WHERE client_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_history(orders, sales, contracts)?;

        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::from_foreign_key(e, || history_conflict(orders, sales, contracts))
            })?;
        audit::record(&mut tx, "Client deleted", &name, user_name).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Printers currently rented to the client (location equals the client name)
    pub async fn rented_printers(&self, id: Uuid) -> AppResult<Vec<RentedPrinter>> {
        let Some(name) = sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, RentedPrinterRow>(
            r#"
            SELECT id, model, serial, mlt, counter
            FROM printers
            WHERE status = $1 AND location = $2
            ORDER BY model
            "#,
        )
        .bind(PrinterStatus::Rented.as_str())
        .bind(&name)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RentedPrinter {
                id: r.id,
                label: rented_printer_label(&r.model, Some(&r.serial), r.mlt.as_deref()),
                counter: r.counter,
            })
            .collect())
    }
}

fn history_conflict(orders: i64, sales: i64, contracts: i64) -> AppError {
    AppError::Conflict {
        resource: "client".to_string(),
        message: format!(
            "Client has {} rental orders, {} sales and {} contracts and cannot be deleted",
            orders, sales, contracts
        ),
        message_pt: "Cliente possui histórico e não pode ser excluído".to_string(),
    }
}

fn ensure_no_history(orders: i64, sales: i64, contracts: i64) -> AppResult<()> {
    if orders + sales + contracts > 0 {
        return Err(history_conflict(orders, sales, contracts));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ClientInput {
        ClientInput {
            name: "Acme Ltda".to_string(),
            person_type: Some(PersonType::Company),
            document: Some("11.222.333/0001-81".to_string()),
            address: None,
            phone: None,
            email: Some("contato@acme.com.br".to_string()),
            closing_day: Some("10".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_valid_client_passes() {
        assert!(input().check().is_ok());
    }

    #[test]
    fn test_bad_document_rejected() {
        let mut i = input();
        i.document = Some("11.222.333/0001-00".to_string());
        assert!(matches!(i.check(), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_document_without_person_type_not_checked() {
        let mut i = input();
        i.person_type = None;
        i.document = Some("123".to_string());
        assert!(i.check().is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut i = input();
        i.name = "   ".to_string();
        assert!(i.check().is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" a ".into())), Some("a".into()));
    }

    #[test]
    fn test_client_with_history_is_a_conflict() {
        assert!(ensure_no_history(0, 0, 0).is_ok());
        for (orders, sales, contracts) in [(1, 0, 0), (0, 2, 0), (0, 0, 1)] {
            assert!(matches!(
                ensure_no_history(orders, sales, contracts),
                Err(AppError::Conflict { .. })
            ));
        }
    }

    #[test]
    fn test_email_uses_validator_rule() {
        let mut i = input();
        i.email = Some("contato@".to_string());
        assert!(matches!(i.check(), Err(AppError::Validation { .. })));
        i.email = Some("   ".to_string());
        assert!(i.check().is_ok());
    }
}
