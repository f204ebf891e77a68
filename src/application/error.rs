use thiserror::Error;

use crate::domain::{AccountId, AccountStatus, Amount, OwnerType};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Balance not found for account: {0}")]
    BalanceNotFound(AccountId),

    #[error("Owner not found: {owner_type} {owner_id}")]
    OwnerNotFound {
        owner_type: OwnerType,
        owner_id: i64,
    },

    #[error("Account {account_id} is {status}, not active")]
    InactiveAccount {
        account_id: AccountId,
        status: AccountStatus,
    },

    #[error("Account {0} is closed and cannot change status")]
    AccountClosed(AccountId),

    #[error("Insufficient funds on account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("Release exceeds held amount on account {account_id}: held {held}, requested {requested}")]
    InvalidReleaseAmount {
        account_id: AccountId,
        held: Amount,
        requested: Amount,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Concurrent modification of account {0}: retries exhausted, resubmit the operation")]
    ConcurrentModification(AccountId),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
