use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;

/// Who an account belongs to. Owners live in external services; the ledger
/// only keeps the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    User,
    Project,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::User => "user",
            OwnerType::Project => "project",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(OwnerType::User),
            "project" => Some(OwnerType::Project),
            _ => None,
        }
    }
}

impl std::fmt::Display for OwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Opened but not yet activated; balance operations are refused.
    Pending,
    /// Fully operational.
    Active,
    /// Blocked; balance operations are refused until reactivation.
    Frozen,
    /// Terminal. A closed account never changes status again.
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
            AccountStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(AccountStatus::Pending),
            "active" => Some(AccountStatus::Active),
            "frozen" => Some(AccountStatus::Frozen),
            "closed" => Some(AccountStatus::Closed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment account. The account row carries identity, ownership and
/// lifecycle status; the money itself lives in the account's [`Balance`].
///
/// [`Balance`]: super::Balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Unique human-facing account number, assigned by the repository
    /// from the number sequence.
    pub number: String,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub currency: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status change.
    pub changed_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Open a new account. The number must be assigned by the repository,
    /// and the account stays `Pending` until activated.
    pub fn open(owner_type: OwnerType, owner_id: i64, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number: String::new(),
            owner_type,
            owner_id,
            currency,
            status: AccountStatus::Pending,
            created_at: now,
            changed_at: now,
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_closed(&self) -> bool {
        self.status == AccountStatus::Closed
    }

    /// Transition to a new status. Closed is terminal.
    pub fn change_status(&mut self, status: AccountStatus) -> Result<(), StatusChangeError> {
        if self.is_closed() {
            return Err(StatusChangeError::AccountClosed(self.id));
        }
        if self.status != status {
            self.status = status;
            self.changed_at = Utc::now();
            if status == AccountStatus::Closed {
                self.closed_at = Some(self.changed_at);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeError {
    AccountClosed(AccountId),
}

impl std::fmt::Display for StatusChangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusChangeError::AccountClosed(id) => {
                write!(f, "Account {} is closed and cannot change status", id)
            }
        }
    }
}

impl std::error::Error for StatusChangeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AccountStatus::Pending,
            AccountStatus::Active,
            AccountStatus::Frozen,
            AccountStatus::Closed,
        ] {
            let s = status.as_str();
            let parsed = AccountStatus::from_str(s).unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_new_account_is_pending() {
        let account = Account::open(OwnerType::User, 42, "EUR".into());
        assert_eq!(account.status, AccountStatus::Pending);
        assert!(!account.is_active());
        assert!(account.closed_at.is_none());
    }

    #[test]
    fn test_activate_then_freeze() {
        let mut account = Account::open(OwnerType::Project, 7, "EUR".into());
        account.change_status(AccountStatus::Active).unwrap();
        assert!(account.is_active());

        account.change_status(AccountStatus::Frozen).unwrap();
        assert!(!account.is_active());
        assert_eq!(account.status, AccountStatus::Frozen);
    }

    #[test]
    fn test_close_sets_closed_at() {
        let mut account = Account::open(OwnerType::User, 1, "EUR".into());
        account.change_status(AccountStatus::Active).unwrap();
        account.change_status(AccountStatus::Closed).unwrap();
        assert!(account.is_closed());
        assert!(account.closed_at.is_some());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut account = Account::open(OwnerType::User, 1, "EUR".into());
        account.change_status(AccountStatus::Closed).unwrap();

        let result = account.change_status(AccountStatus::Active);
        assert!(matches!(result, Err(StatusChangeError::AccountClosed(_))));
        assert!(account.is_closed());
    }
}
