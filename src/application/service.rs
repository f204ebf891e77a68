use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::clients::OwnerDirectory;
use crate::domain::{
    Account, AccountId, AccountStatus, Amount, AuditRecord, Balance, BalanceFigures,
    OperationError, OperationKind, OwnerType, StatusChangeError, apply_operation,
};
use crate::storage::{MutationOutcome, Repository};

use super::LedgerError;

/// How many times an optimistic-lock loser re-reads, re-validates and
/// re-applies before the conflict is surfaced to the caller.
const RETRY_BUDGET: u32 = 3;

/// Application service providing the ledger operations. This is the primary
/// interface for any caller (CLI, API, event listener).
pub struct LedgerService {
    repo: Repository,
    owners: Arc<dyn OwnerDirectory>,
}

/// Caller-facing balance snapshot. The version column is concurrency
/// plumbing and stays internal.
#[derive(Debug, Clone)]
pub struct BalanceView {
    pub account_id: AccountId,
    pub authorized: Amount,
    pub actual: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Balance> for BalanceView {
    fn from(balance: &Balance) -> Self {
        Self {
            account_id: balance.account_id,
            authorized: balance.authorized,
            actual: balance.actual,
            created_at: balance.created_at,
            updated_at: balance.updated_at,
        }
    }
}

/// Result of a transfer: the post-transfer balances of both sides.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub from: BalanceView,
    pub to: BalanceView,
}

impl LedgerService {
    /// Create a new ledger service with the given repository and owner
    /// directory.
    pub fn new(repo: Repository, owners: Arc<dyn OwnerDirectory>) -> Self {
        Self { repo, owners }
    }

    /// Initialize a new database at the given path.
    pub async fn init(
        database_path: &str,
        owners: Arc<dyn OwnerDirectory>,
    ) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, owners))
    }

    /// Connect to an existing database.
    pub async fn connect(
        database_path: &str,
        owners: Arc<dyn OwnerDirectory>,
    ) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, owners))
    }

    // ========================
    // Account lifecycle
    // ========================

    /// Open a new payment account with a zeroed balance. The owner must be
    /// known to the owner directory; the account starts `Pending`.
    pub async fn open_account(
        &self,
        owner_type: OwnerType,
        owner_id: i64,
        currency: String,
    ) -> Result<Account, LedgerError> {
        if !self.owners.exists(owner_type, owner_id).await? {
            return Err(LedgerError::OwnerNotFound {
                owner_type,
                owner_id,
            });
        }

        let mut account = Account::open(owner_type, owner_id, currency);
        let balance = Balance::new(account.id);
        self.repo.create_account(&mut account, &balance).await?;

        info!(
            "Opened account {} ({}) for {} {}",
            account.number, account.id, owner_type, owner_id
        );
        Ok(account)
    }

    /// Change an account's status. Closed accounts are terminal.
    pub async fn update_status(
        &self,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, LedgerError> {
        let mut account = self.load_account(account_id).await?;

        account
            .change_status(status)
            .map_err(|StatusChangeError::AccountClosed(id)| LedgerError::AccountClosed(id))?;
        self.repo.update_account_status(&account).await?;

        info!("Account {} is now {}", account.number, account.status);
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.load_account(account_id).await
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, number: &str) -> Result<Account, LedgerError> {
        self.repo
            .get_account_by_number(number)
            .await?
            .ok_or_else(|| LedgerError::InvalidArgument(format!("unknown account number {}", number)))
    }

    // ========================
    // Balance operations
    // ========================

    /// Get the current balance of an account.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<BalanceView, LedgerError> {
        let balance = self.load_balance(account_id).await?;
        Ok(BalanceView::from(&balance))
    }

    /// Credit settled funds.
    pub async fn increase(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<BalanceView, LedgerError> {
        self.apply(account_id, OperationKind::Increase, amount, None)
            .await
    }

    /// Debit settled funds.
    pub async fn decrease(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<BalanceView, LedgerError> {
        self.apply(account_id, OperationKind::Decrease, amount, None)
            .await
    }

    /// Place a hold on available funds.
    pub async fn reserve(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<BalanceView, LedgerError> {
        self.apply(account_id, OperationKind::Reserve, amount, None)
            .await
    }

    /// Settle a hold into a spend: the held amount leaves the account.
    pub async fn release(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<BalanceView, LedgerError> {
        self.apply(account_id, OperationKind::Release, amount, None)
            .await
    }

    /// Drop a hold; no money moves.
    pub async fn cancel_reservation(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<BalanceView, LedgerError> {
        self.apply(account_id, OperationKind::CancelReservation, amount, None)
            .await
    }

    /// Apply one balance operation under optimistic concurrency control.
    ///
    /// When a correlation id is supplied and an audit record already
    /// carries it, the recorded result is returned without re-applying:
    /// at-least-once deliveries of the same upstream event converge on one
    /// mutation. Version conflicts are retried from a fresh read, full
    /// validation included, up to the retry budget.
    pub async fn apply(
        &self,
        account_id: AccountId,
        kind: OperationKind,
        amount: Amount,
        correlation_id: Option<&str>,
    ) -> Result<BalanceView, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        if let Some(cid) = correlation_id {
            if let Some(prior) = self.repo.find_audit_by_correlation(cid).await? {
                info!("Operation {} already applied, returning recorded result", cid);
                return self.replay_view(&prior).await;
            }
        }

        for attempt in 1..=RETRY_BUDGET {
            self.ensure_active(account_id).await?;
            let balance = self.load_balance(account_id).await?;

            let figures = apply_operation(&balance, kind, amount)
                .map_err(|err| Self::operation_error(account_id, err))?;
            let updated = Self::mutated(balance, figures);

            let number = self.repo.next_audit_number().await?;
            let audit = AuditRecord::for_mutation(
                number,
                &updated,
                kind,
                correlation_id.map(String::from),
            );

            match self.repo.commit_mutation(&updated, &audit).await? {
                MutationOutcome::Applied => {
                    info!(
                        "Applied {} of {} to account {} (version {})",
                        kind, amount, account_id, updated.version
                    );
                    return Ok(BalanceView::from(&updated));
                }
                MutationOutcome::VersionConflict => {
                    warn!(
                        "Concurrent modification of account {}, retrying ({}/{})",
                        account_id, attempt, RETRY_BUDGET
                    );
                }
                MutationOutcome::DuplicateCorrelation => {
                    return self.recorded_result(correlation_id).await;
                }
            }
        }

        Err(LedgerError::ConcurrentModification(account_id))
    }

    /// Move settled funds between two accounts as one atomic unit: the
    /// source debit and destination credit commit together or not at all.
    /// The source is validated first; the destination is never touched
    /// when the source cannot cover the amount.
    pub async fn transfer(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> Result<TransferOutcome, LedgerError> {
        if from_account_id == to_account_id {
            return Err(LedgerError::InvalidArgument(
                "transfer source and destination must differ".into(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        for attempt in 1..=RETRY_BUDGET {
            self.ensure_active(from_account_id).await?;
            self.ensure_active(to_account_id).await?;

            let from_balance = self.load_balance(from_account_id).await?;
            let to_balance = self.load_balance(to_account_id).await?;

            let from_figures =
                apply_operation(&from_balance, OperationKind::Decrease, amount)
                    .map_err(|err| Self::operation_error(from_account_id, err))?;
            let to_figures = apply_operation(&to_balance, OperationKind::Increase, amount)
                .map_err(|err| Self::operation_error(to_account_id, err))?;

            let from_updated = Self::mutated(from_balance, from_figures);
            let to_updated = Self::mutated(to_balance, to_figures);

            let from_audit = AuditRecord::for_mutation(
                self.repo.next_audit_number().await?,
                &from_updated,
                OperationKind::Decrease,
                None,
            );
            let to_audit = AuditRecord::for_mutation(
                self.repo.next_audit_number().await?,
                &to_updated,
                OperationKind::Increase,
                None,
            );

            match self
                .repo
                .commit_transfer(&from_updated, &to_updated, &from_audit, &to_audit)
                .await?
            {
                MutationOutcome::Applied => {
                    info!(
                        "Transferred {} from account {} to account {}",
                        amount, from_account_id, to_account_id
                    );
                    return Ok(TransferOutcome {
                        from: BalanceView::from(&from_updated),
                        to: BalanceView::from(&to_updated),
                    });
                }
                MutationOutcome::VersionConflict => {
                    warn!(
                        "Concurrent modification during transfer {} -> {}, retrying ({}/{})",
                        from_account_id, to_account_id, attempt, RETRY_BUDGET
                    );
                }
                MutationOutcome::DuplicateCorrelation => {
                    return Err(LedgerError::Database(anyhow!(
                        "unexpected correlation conflict on transfer"
                    )));
                }
            }
        }

        Err(LedgerError::ConcurrentModification(from_account_id))
    }

    /// An account's audit trail, in insertion order.
    pub async fn history(&self, account_id: AccountId) -> Result<Vec<AuditRecord>, LedgerError> {
        self.load_account(account_id).await?;
        Ok(self.repo.list_audits(account_id).await?)
    }

    // ========================
    // Internals
    // ========================

    async fn load_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.repo
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn load_balance(&self, account_id: AccountId) -> Result<Balance, LedgerError> {
        self.repo
            .get_balance(account_id)
            .await?
            .ok_or(LedgerError::BalanceNotFound(account_id))
    }

    async fn ensure_active(&self, account_id: AccountId) -> Result<(), LedgerError> {
        let account = self.load_account(account_id).await?;
        if !account.is_active() {
            return Err(LedgerError::InactiveAccount {
                account_id,
                status: account.status,
            });
        }
        Ok(())
    }

    fn mutated(balance: Balance, figures: BalanceFigures) -> Balance {
        Balance {
            authorized: figures.authorized,
            actual: figures.actual,
            version: balance.version + 1,
            updated_at: Utc::now(),
            ..balance
        }
    }

    fn operation_error(account_id: AccountId, err: OperationError) -> LedgerError {
        match err {
            OperationError::InvalidAmount { amount } => LedgerError::InvalidArgument(format!(
                "amount must be positive, got {}",
                amount
            )),
            OperationError::InsufficientFunds {
                available,
                requested,
            } => LedgerError::InsufficientFunds {
                account_id,
                available,
                requested,
            },
            OperationError::InvalidReleaseAmount { held, requested } => {
                LedgerError::InvalidReleaseAmount {
                    account_id,
                    held,
                    requested,
                }
            }
        }
    }

    /// The result previously recorded for a correlation id. Used when a
    /// concurrent duplicate delivery lost the race to the audit index.
    async fn recorded_result(
        &self,
        correlation_id: Option<&str>,
    ) -> Result<BalanceView, LedgerError> {
        let cid = correlation_id.ok_or_else(|| {
            LedgerError::Database(anyhow!("correlation conflict without correlation id"))
        })?;
        let prior = self
            .repo
            .find_audit_by_correlation(cid)
            .await?
            .ok_or_else(|| {
                LedgerError::Database(anyhow!("no audit record for correlation id {}", cid))
            })?;
        self.replay_view(&prior).await
    }

    /// Rebuild the caller-facing result of an already-applied operation
    /// from its audit record.
    async fn replay_view(&self, prior: &AuditRecord) -> Result<BalanceView, LedgerError> {
        let balance = self.load_balance(prior.account_id).await?;
        Ok(BalanceView {
            account_id: prior.account_id,
            authorized: prior.authorized,
            actual: prior.actual,
            created_at: balance.created_at,
            updated_at: prior.created_at,
        })
    }
}
