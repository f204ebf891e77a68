use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountStatus, AuditRecord, Balance, OperationKind, OwnerType,
};

use super::MIGRATION_001_INITIAL;

/// Outcome of a transactional balance write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Balance row updated and audit record appended.
    Applied,
    /// The stored version no longer matches the version the caller read;
    /// nothing was written. Re-read and re-validate before retrying.
    VersionConflict,
    /// An audit record with this correlation id already exists; nothing
    /// was written. The prior record holds the result.
    DuplicateCorrelation,
}

/// Repository for accounts, balances and the audit trail.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Persist a newly opened account together with its zeroed balance, in
    /// one transaction. Assigns the account number from the sequence.
    pub async fn create_account(&self, account: &mut Account, balance: &Balance) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let number: i64 = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'account_number'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .context("Failed to draw account number")?
        .get("value");
        account.number = format!("{:020}", number);

        sqlx::query(
            r#"
            INSERT INTO accounts (id, number, owner_type, owner_id, currency, status, created_at, changed_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.number)
        .bind(account.owner_type.as_str())
        .bind(account.owner_id)
        .bind(&account.currency)
        .bind(account.status.as_str())
        .bind(account.created_at.to_rfc3339())
        .bind(account.changed_at.to_rfc3339())
        .bind(account.closed_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await
        .context("Failed to save account")?;

        sqlx::query(
            r#"
            INSERT INTO balances (account_id, authorized, actual, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(balance.account_id.to_string())
        .bind(balance.authorized.to_string())
        .bind(balance.actual.to_string())
        .bind(balance.version)
        .bind(balance.created_at.to_rfc3339())
        .bind(balance.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save balance")?;

        tx.commit().await.context("Failed to commit account creation")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, number, owner_type, owner_id, currency, status, created_at, changed_at, closed_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, number, owner_type, owner_id, currency, status, created_at, changed_at, closed_at
            FROM accounts
            WHERE number = ?
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist a status change.
    pub async fn update_account_status(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET status = ?, changed_at = ?, closed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(account.status.as_str())
        .bind(account.changed_at.to_rfc3339())
        .bind(account.closed_at.map(|dt| dt.to_rfc3339()))
        .bind(account.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update account status")?;
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let owner_type_str: String = row.get("owner_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");
        let changed_at_str: String = row.get("changed_at");
        let closed_at_str: Option<String> = row.get("closed_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            number: row.get("number"),
            owner_type: OwnerType::from_str(&owner_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid owner type: {}", owner_type_str))?,
            owner_id: row.get("owner_id"),
            currency: row.get("currency"),
            status: AccountStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account status: {}", status_str))?,
            created_at: Self::parse_timestamp(&created_at_str)?,
            changed_at: Self::parse_timestamp(&changed_at_str)?,
            closed_at: closed_at_str
                .map(|s| Self::parse_timestamp(&s))
                .transpose()?,
        })
    }

    // ========================
    // Balance operations
    // ========================

    /// Get the balance for an account.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Option<Balance>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, authorized, actual, version, created_at, updated_at
            FROM balances
            WHERE account_id = ?
            "#,
        )
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch balance")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_balance(&row)?)),
            None => Ok(None),
        }
    }

    /// Write a mutated balance and append its audit record in one
    /// transaction. `balance` carries the post-mutation figures and the
    /// new version; the row must still be at `balance.version - 1` or the
    /// write is rejected as a version conflict.
    pub async fn commit_mutation(
        &self,
        balance: &Balance,
        audit: &AuditRecord,
    ) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        if !Self::update_balance_row(&mut tx, balance).await? {
            tx.rollback().await.context("Failed to roll back")?;
            return Ok(MutationOutcome::VersionConflict);
        }

        match Self::insert_audit_row(&mut tx, audit).await {
            Ok(()) => {}
            Err(err) if Self::is_correlation_conflict(&err, audit) => {
                tx.rollback().await.context("Failed to roll back")?;
                return Ok(MutationOutcome::DuplicateCorrelation);
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await.context("Failed to commit mutation")?;
        Ok(MutationOutcome::Applied)
    }

    /// Commit a transfer: both balance updates and both audit appends in a
    /// single transaction. Either everything becomes visible or nothing
    /// does; a version conflict on either side rejects the whole transfer.
    pub async fn commit_transfer(
        &self,
        from: &Balance,
        to: &Balance,
        from_audit: &AuditRecord,
        to_audit: &AuditRecord,
    ) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        if !Self::update_balance_row(&mut tx, from).await?
            || !Self::update_balance_row(&mut tx, to).await?
        {
            tx.rollback().await.context("Failed to roll back")?;
            return Ok(MutationOutcome::VersionConflict);
        }

        match Self::insert_audit_row(&mut tx, from_audit).await {
            Ok(()) => {}
            Err(err) if Self::is_correlation_conflict(&err, from_audit) => {
                tx.rollback().await.context("Failed to roll back")?;
                return Ok(MutationOutcome::DuplicateCorrelation);
            }
            Err(err) => return Err(err.into()),
        }
        match Self::insert_audit_row(&mut tx, to_audit).await {
            Ok(()) => {}
            Err(err) if Self::is_correlation_conflict(&err, to_audit) => {
                tx.rollback().await.context("Failed to roll back")?;
                return Ok(MutationOutcome::DuplicateCorrelation);
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(MutationOutcome::Applied)
    }

    async fn update_balance_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        balance: &Balance,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET authorized = ?, actual = ?, version = ?, updated_at = ?
            WHERE account_id = ? AND version = ?
            "#,
        )
        .bind(balance.authorized.to_string())
        .bind(balance.actual.to_string())
        .bind(balance.version)
        .bind(balance.updated_at.to_rfc3339())
        .bind(balance.account_id.to_string())
        .bind(balance.version - 1)
        .execute(&mut **tx)
        .await
        .context("Failed to update balance")?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_audit_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        audit: &AuditRecord,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO balance_audit (number, account_id, version, authorized, actual, operation, correlation_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&audit.number)
        .bind(audit.account_id.to_string())
        .bind(audit.version)
        .bind(audit.authorized.to_string())
        .bind(audit.actual.to_string())
        .bind(audit.operation.as_str())
        .bind(&audit.correlation_id)
        .bind(audit.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn is_correlation_conflict(err: &sqlx::Error, audit: &AuditRecord) -> bool {
        audit.correlation_id.is_some()
            && err
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false)
    }

    fn row_to_balance(row: &sqlx::sqlite::SqliteRow) -> Result<Balance> {
        let account_id_str: String = row.get("account_id");
        let authorized_str: String = row.get("authorized");
        let actual_str: String = row.get("actual");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(Balance {
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            authorized: Decimal::from_str(&authorized_str)
                .context("Invalid authorized amount")?,
            actual: Decimal::from_str(&actual_str).context("Invalid actual amount")?,
            version: row.get("version"),
            created_at: Self::parse_timestamp(&created_at_str)?,
            updated_at: Self::parse_timestamp(&updated_at_str)?,
        })
    }

    // ========================
    // Audit trail
    // ========================

    /// List an account's audit trail in insertion order.
    pub async fn list_audits(&self, account_id: AccountId) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, number, account_id, version, authorized, actual, operation, correlation_id, created_at
            FROM balance_audit
            WHERE account_id = ?
            ORDER BY seq
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list audit records")?;

        rows.iter().map(Self::row_to_audit).collect()
    }

    /// Find the audit record carrying a correlation id, if any. Used to
    /// detect re-delivery of the same upstream event.
    pub async fn find_audit_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<AuditRecord>> {
        let row = sqlx::query(
            r#"
            SELECT seq, number, account_id, version, authorized, actual, operation, correlation_id, created_at
            FROM balance_audit
            WHERE correlation_id = ?
            "#,
        )
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch audit record by correlation id")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_audit(&row)?)),
            None => Ok(None),
        }
    }

    /// Draw the next audit record number from the sequence.
    pub async fn next_audit_number(&self) -> Result<String> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'audit_number'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to draw audit number")?;

        let value: i64 = row.get("value");
        Ok(format!("{:020}", value))
    }

    fn row_to_audit(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord> {
        let account_id_str: String = row.get("account_id");
        let authorized_str: String = row.get("authorized");
        let actual_str: String = row.get("actual");
        let operation_str: String = row.get("operation");
        let created_at_str: String = row.get("created_at");

        Ok(AuditRecord {
            seq: row.get("seq"),
            number: row.get("number"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            version: row.get("version"),
            authorized: Decimal::from_str(&authorized_str)
                .context("Invalid authorized amount")?,
            actual: Decimal::from_str(&actual_str).context("Invalid actual amount")?,
            operation: OperationKind::from_str(&operation_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid operation kind: {}", operation_str))?,
            correlation_id: row.get("correlation_id"),
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .context("Invalid timestamp")?
            .with_timezone(&Utc))
    }
}
