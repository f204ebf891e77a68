use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount};

/// Per-account balance state. One row per account, created zeroed when the
/// account is opened, mutated only through the operation strategies and
/// never deleted: it survives account closure as historical record.
///
/// `authorized` tracks funds held against future settlement; `actual` is
/// what is settled on the account. Both stay non-negative. The reservable
/// headroom is [`Balance::available`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: AccountId,
    /// Held/reserved but not yet settled.
    pub authorized: Amount,
    /// Settled funds.
    pub actual: Amount,
    /// Optimistic-concurrency token. Incremented by the store on every
    /// successful write; a stale version makes the write fail.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// A zeroed balance for a freshly opened account.
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            authorized: Decimal::ZERO,
            actual: Decimal::ZERO,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Headroom for new reservations: settled funds not already held.
    pub fn available(&self) -> Amount {
        self.actual - self.authorized
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_new_balance_is_zeroed() {
        let balance = Balance::new(Uuid::new_v4());
        assert_eq!(balance.authorized, Decimal::ZERO);
        assert_eq!(balance.actual, Decimal::ZERO);
        assert_eq!(balance.version, 1);
    }

    #[test]
    fn test_available_subtracts_held_funds() {
        let mut balance = Balance::new(Uuid::new_v4());
        balance.actual = dec!(100);
        balance.authorized = dec!(30);
        assert_eq!(balance.available(), dec!(70));
    }
}
