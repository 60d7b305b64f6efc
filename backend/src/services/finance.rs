//! Ledger service: bank accounts, receivables and payables
//!
//! Settling an entry moves money into or out of a bank account through a
//! bank transaction; reopening writes the reversing transaction. Other
//! services raise and cancel entries inside their own transactions through
//! the free functions at the bottom of this module.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    check_transition, deserialize_money, deserialize_optional_money, format_brl, round_money,
    EntryKind, EntrySource, EntryStatus, LedgerError, PaymentStatus,
};

use crate::error::{AppError, AppResult};
use crate::services::{audit, sale};

#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankAccount {
    pub id: Uuid,
    pub name: String,
    pub bank_name: Option<String>,
    pub branch: Option<String>,
    pub account_number: Option<String>,
    pub opening_balance: Decimal,
    pub balance: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountInput {
    pub name: String,
    pub bank_name: Option<String>,
    pub branch: Option<String>,
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_money")]
    pub opening_balance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountInput {
    pub name: String,
    pub bank_name: Option<String>,
    pub branch: Option<String>,
    pub account_number: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankTransaction {
    pub id: Uuid,
    pub bank_account_id: Uuid,
    pub ledger_entry_id: Option<Uuid>,
    pub amount: Decimal,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AccountStatement {
    pub account: BankAccount,
    pub transactions: Vec<BankTransaction>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: String,
    pub source: String,
    pub source_id: Option<Uuid>,
    pub bank_account_id: Option<Uuid>,
    pub settled_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub overdue: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManualEntryInput {
    pub kind: EntryKind,
    pub description: String,
    pub client_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[serde(deserialize_with = "deserialize_money")]
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub overdue_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettleInput {
    pub bank_account_id: Uuid,
    pub settled_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct FinanceSummary {
    pub open_receivables: Decimal,
    pub open_payables: Decimal,
    pub overdue_receivables: Decimal,
    pub overdue_payables: Decimal,
    pub bank_balance: Decimal,
}

/// An entry raised by another document
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub kind: EntryKind,
    pub description: String,
    pub client_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub source: EntrySource,
    pub source_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Locked ledger row used for status transitions
#[derive(Debug, FromRow)]
struct EntryLock {
    id: Uuid,
    kind: String,
    description: String,
    amount: Decimal,
    status: String,
    source: String,
    source_id: Option<Uuid>,
    bank_account_id: Option<Uuid>,
}

impl EntryLock {
    fn kind(&self) -> AppResult<EntryKind> {
        EntryKind::from_str(&self.kind)
            .ok_or_else(|| AppError::Internal(format!("Invalid stored entry kind {}", self.kind)))
    }

    fn status(&self) -> AppResult<EntryStatus> {
        EntryStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Invalid stored entry status {}", self.status)))
    }

    /// The sale paid by this entry, if any
    fn sale_id(&self) -> Option<Uuid> {
        (self.source == EntrySource::Sale.as_str())
            .then_some(self.source_id)
            .flatten()
    }
}

const ENTRY_SELECT: &str = r#"
    SELECT e.id, e.kind, e.description, e.client_id, c.name AS client_name,
           e.supplier_id, s.name AS supplier_name, e.amount, e.due_date, e.status,
           e.source, e.source_id, e.bank_account_id, e.settled_on, e.notes, e.created_at,
           (e.status = 'open' AND e.due_date < $1) AS overdue
    FROM ledger_entries e
    LEFT JOIN clients c ON c.id = e.client_id
    LEFT JOIN suppliers s ON s.id = e.supplier_id
"#;

const ACCOUNT_COLUMNS: &str =
    "id, name, bank_name, branch, account_number, opening_balance, balance, active, created_at";

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "Name is required", "Informe o nome"));
    }
    Ok(name)
}

impl FinanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Bank accounts
    // ------------------------------------------------------------------

    pub async fn create_account(&self, input: CreateAccountInput, user_name: &str) -> AppResult<BankAccount> {
        let name = require_name(&input.name)?;
        let opening = round_money(input.opening_balance.unwrap_or(Decimal::ZERO));

        let mut tx = self.db.begin().await?;
        let account = sqlx::query_as::<_, BankAccount>(&format!(
            r#"
            INSERT INTO bank_accounts (name, bank_name, branch, account_number, opening_balance, balance)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(name)
        .bind(trimmed(input.bank_name))
        .bind(trimmed(input.branch))
        .bind(trimmed(input.account_number))
        .bind(opening)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            "New bank account",
            &format!("{} ({})", account.name, format_brl(opening)),
            user_name,
        )
        .await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Update account metadata; balances only move through transactions
    pub async fn update_account(
        &self,
        id: Uuid,
        input: UpdateAccountInput,
        user_name: &str,
    ) -> AppResult<BankAccount> {
        let name = require_name(&input.name)?;

        let mut tx = self.db.begin().await?;
        let account = sqlx::query_as::<_, BankAccount>(&format!(
            r#"
            UPDATE bank_accounts
            SET name = $2, bank_name = $3, branch = $4, account_number = $5,
                active = COALESCE($6, active), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(trimmed(input.bank_name))
        .bind(trimmed(input.branch))
        .bind(trimmed(input.account_number))
        .bind(input.active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank account".to_string()))?;

        audit::record(&mut tx, "Bank account updated", &account.name, user_name).await?;
        tx.commit().await?;
        Ok(account)
    }

    pub async fn list_accounts(&self) -> AppResult<Vec<BankAccount>> {
        let accounts = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {} FROM bank_accounts ORDER BY active DESC, name",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(accounts)
    }

    pub async fn statement(&self, id: Uuid) -> AppResult<AccountStatement> {
        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {} FROM bank_accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank account".to_string()))?;

        let transactions = sqlx::query_as::<_, BankTransaction>(
            r#"
            SELECT id, bank_account_id, ledger_entry_id, amount, description, occurred_on, created_at
            FROM bank_transactions
            WHERE bank_account_id = $1
            ORDER BY occurred_on DESC, created_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(AccountStatement {
            account,
            transactions,
        })
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    pub async fn create_manual(&self, input: ManualEntryInput, user_name: &str) -> AppResult<LedgerEntry> {
        let description = input.description.trim();
        if description.is_empty() {
            return Err(AppError::field(
                "description",
                "Description is required",
                "Informe a descrição",
            ));
        }

        let mut tx = self.db.begin().await?;
        let id = insert_entry(
            &mut tx,
            &NewLedgerEntry {
                kind: input.kind,
                description: description.to_string(),
                client_id: input.client_id,
                supplier_id: input.supplier_id,
                amount: input.amount,
                due_date: input.due_date,
                source: EntrySource::Manual,
                source_id: None,
                notes: trimmed(input.notes),
            },
        )
        .await?;
        audit::record(
            &mut tx,
            "New ledger entry",
            &format!("{} {} ({})", input.kind.as_str(), description, format_brl(input.amount)),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_entry(id, Utc::now().date_naive()).await
    }

    pub async fn get_entry(&self, id: Uuid, today: NaiveDate) -> AppResult<LedgerEntry> {
        sqlx::query_as::<_, LedgerEntry>(&format!("{} WHERE e.id = $2", ENTRY_SELECT))
            .bind(today)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Ledger entry".to_string()))
    }

    /// Entries by due date, oldest first
    pub async fn list_entries(&self, filter: &EntryFilter, today: NaiveDate) -> AppResult<Vec<LedgerEntry>> {
        let status = if filter.overdue_only {
            Some(EntryStatus::Open)
        } else {
            filter.status
        };
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"{}
            WHERE ($2::TEXT IS NULL OR e.kind = $2)
              AND ($3::TEXT IS NULL OR e.status = $3)
              AND ($4 = FALSE OR e.due_date < $1)
            ORDER BY e.due_date, e.created_at
            "#,
            ENTRY_SELECT
        ))
        .bind(today)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(filter.overdue_only)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    /// Settle an open entry against a bank account
    pub async fn settle(&self, id: Uuid, input: SettleInput, user_name: &str) -> AppResult<LedgerEntry> {
        let today = Utc::now().date_naive();
        let settled_on = input.settled_on.unwrap_or(today);

        let mut tx = self.db.begin().await?;
        let entry = lock_entry(&mut tx, id).await?;
        check_transition(entry.status()?, EntryStatus::Settled)?;

        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM bank_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(input.bank_account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank account".to_string()))?;
        if !active {
            return Err(AppError::BusinessRule("Bank account is inactive".to_string()));
        }

        let effect = entry.kind()?.settlement_effect(entry.amount);
        post_transaction(
            &mut tx,
            input.bank_account_id,
            entry.id,
            effect,
            &entry.description,
            settled_on,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE ledger_entries
            SET status = $2, bank_account_id = $3, settled_on = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(EntryStatus::Settled.as_str())
        .bind(input.bank_account_id)
        .bind(settled_on)
        .execute(&mut *tx)
        .await?;

        if let Some(sale_id) = entry.sale_id() {
            sale::set_payment_status(&mut tx, sale_id, PaymentStatus::Paid).await?;
        }

        audit::record(
            &mut tx,
            "Ledger entry settled",
            &format!("{} ({})", entry.description, format_brl(entry.amount)),
            user_name,
        )
        .await?;
        tx.commit().await?;

        self.get_entry(id, today).await
    }

    /// Reopen a settled entry, reversing its bank transaction
    pub async fn reopen(&self, id: Uuid, user_name: &str) -> AppResult<LedgerEntry> {
        let mut tx = self.db.begin().await?;
        let entry = lock_entry(&mut tx, id).await?;
        check_transition(entry.status()?, EntryStatus::Open)?;

        reverse_settlement(&mut tx, &entry).await?;
        if let Some(sale_id) = entry.sale_id() {
            sale::set_payment_status(&mut tx, sale_id, PaymentStatus::Pending).await?;
        }

        audit::record(&mut tx, "Ledger entry reopened", &entry.description, user_name).await?;
        tx.commit().await?;

        self.get_entry(id, Utc::now().date_naive()).await
    }

    /// Cancel an open entry
    pub async fn cancel(&self, id: Uuid, user_name: &str) -> AppResult<LedgerEntry> {
        let mut tx = self.db.begin().await?;
        let entry = lock_entry(&mut tx, id).await?;
        check_transition(entry.status()?, EntryStatus::Canceled)?;

        mark_canceled(&mut tx, entry.id).await?;
        audit::record(&mut tx, "Ledger entry canceled", &entry.description, user_name).await?;
        tx.commit().await?;

        self.get_entry(id, Utc::now().date_naive()).await
    }

    pub async fn summary(&self, today: NaiveDate) -> AppResult<FinanceSummary> {
        let (open_receivables, open_payables, overdue_receivables, overdue_payables) =
            sqlx::query_as::<_, (Decimal, Decimal, Decimal, Decimal)>(
                r#"
                SELECT
                    COALESCE(SUM(amount) FILTER (WHERE kind = $1), 0),
                    COALESCE(SUM(amount) FILTER (WHERE kind = $2), 0),
                    COALESCE(SUM(amount) FILTER (WHERE kind = $1 AND due_date < $4), 0),
                    COALESCE(SUM(amount) FILTER (WHERE kind = $2 AND due_date < $4), 0)
                FROM ledger_entries
                WHERE status = $3
                "#,
            )
            .bind(EntryKind::Receivable.as_str())
            .bind(EntryKind::Payable.as_str())
            .bind(EntryStatus::Open.as_str())
            .bind(today)
            .fetch_one(&self.db)
            .await?;

        let bank_balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(balance), 0) FROM bank_accounts WHERE active = TRUE",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(FinanceSummary {
            open_receivables,
            open_payables,
            overdue_receivables,
            overdue_payables,
            bank_balance,
        })
    }
}

async fn lock_entry(conn: &mut PgConnection, id: Uuid) -> AppResult<EntryLock> {
    sqlx::query_as::<_, EntryLock>(
        r#"
        SELECT id, kind, description, amount, status, source, source_id, bank_account_id
        FROM ledger_entries
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Ledger entry".to_string()))
}

async fn post_transaction(
    conn: &mut PgConnection,
    account_id: Uuid,
    entry_id: Uuid,
    amount: Decimal,
    description: &str,
    occurred_on: NaiveDate,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bank_transactions (bank_account_id, ledger_entry_id, amount, description, occurred_on)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(account_id)
    .bind(entry_id)
    .bind(amount)
    .bind(description)
    .bind(occurred_on)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE bank_accounts SET balance = balance + $2, updated_at = NOW() WHERE id = $1")
        .bind(account_id)
        .bind(amount)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Write the reversing transaction of a settled entry and reopen it
async fn reverse_settlement(conn: &mut PgConnection, entry: &EntryLock) -> AppResult<()> {
    let account_id = entry.bank_account_id.ok_or_else(|| {
        AppError::Internal(format!("Settled entry {} has no bank account", entry.id))
    })?;
    let effect = entry.kind()?.settlement_effect(entry.amount);
    post_transaction(
        &mut *conn,
        account_id,
        entry.id,
        -effect,
        &format!("Reversal: {}", entry.description),
        Utc::now().date_naive(),
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE ledger_entries
        SET status = $2, bank_account_id = NULL, settled_on = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(entry.id)
    .bind(EntryStatus::Open.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn mark_canceled(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE ledger_entries SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(EntryStatus::Canceled.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Raise an open entry inside the caller's transaction
pub async fn insert_entry(conn: &mut PgConnection, entry: &NewLedgerEntry) -> AppResult<Uuid> {
    let amount = round_money(entry.amount);
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount.into());
    }
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO ledger_entries (
            kind, description, client_id, supplier_id, amount, due_date, status, source, source_id, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(entry.kind.as_str())
    .bind(&entry.description)
    .bind(entry.client_id)
    .bind(entry.supplier_id)
    .bind(amount)
    .bind(entry.due_date)
    .bind(EntryStatus::Open.as_str())
    .bind(entry.source.as_str())
    .bind(entry.source_id)
    .bind(&entry.notes)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Move the due date of the open entries raised by a document
pub async fn reschedule_source(
    conn: &mut PgConnection,
    source: EntrySource,
    source_id: Uuid,
    due_date: NaiveDate,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE ledger_entries
        SET due_date = $3, updated_at = NOW()
        WHERE source = $1 AND source_id = $2 AND status = $4
        "#,
    )
    .bind(source.as_str())
    .bind(source_id)
    .bind(due_date)
    .bind(EntryStatus::Open.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

/// Cancel the entries raised by a document, reversing any settlement
pub async fn cancel_by_source(
    conn: &mut PgConnection,
    source: EntrySource,
    source_id: Uuid,
) -> AppResult<()> {
    let entries = sqlx::query_as::<_, EntryLock>(
        r#"
        SELECT id, kind, description, amount, status, source, source_id, bank_account_id
        FROM ledger_entries
        WHERE source = $1 AND source_id = $2 AND status <> $3
        FOR UPDATE
        "#,
    )
    .bind(source.as_str())
    .bind(source_id)
    .bind(EntryStatus::Canceled.as_str())
    .fetch_all(&mut *conn)
    .await?;

    for entry in &entries {
        if entry.status()? == EntryStatus::Settled {
            reverse_settlement(&mut *conn, entry).await?;
        }
        mark_canceled(&mut *conn, entry.id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(source: &str, source_id: Option<Uuid>) -> EntryLock {
        EntryLock {
            id: Uuid::new_v4(),
            kind: "receivable".to_string(),
            description: "Sale #1".to_string(),
            amount: Decimal::new(10000, 2),
            status: "open".to_string(),
            source: source.to_string(),
            source_id,
            bank_account_id: None,
        }
    }

    #[test]
    fn test_sale_id_only_for_sale_sources() {
        let id = Uuid::new_v4();
        assert_eq!(lock("sale", Some(id)).sale_id(), Some(id));
        assert_eq!(lock("contract_billing", Some(id)).sale_id(), None);
        assert_eq!(lock("sale", None).sale_id(), None);
    }

    #[test]
    fn test_lock_parses_stored_enums() {
        let entry = lock("manual", None);
        assert_eq!(entry.kind().unwrap(), EntryKind::Receivable);
        assert_eq!(entry.status().unwrap(), EntryStatus::Open);
    }

    #[test]
    fn test_manual_input_accepts_brl_amount() {
        let input: ManualEntryInput = serde_json::from_str(
            r#"{"kind": "payable", "description": "Rent", "amount": "R$ 2.500,00", "due_date": "2024-05-10"}"#,
        )
        .unwrap();
        assert_eq!(input.kind, EntryKind::Payable);
        assert_eq!(input.amount, Decimal::new(250000, 2));
    }

    #[test]
    fn test_require_name_trims() {
        assert_eq!(require_name("  Main  ").unwrap(), "Main");
        assert!(require_name("   ").is_err());
    }
}
