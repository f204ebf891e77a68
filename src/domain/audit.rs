use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, Balance, OperationKind};

/// One immutable audit record per successful balance mutation, written in
/// the same transaction as the balance update. Records are append-only:
/// nothing ever updates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Insertion-order key, assigned by the repository on append. The
    /// per-account audit trail is read back in `seq` order.
    pub seq: i64,
    /// Unique record number drawn from the number sequence; distinct from
    /// the storage key.
    pub number: String,
    pub account_id: AccountId,
    /// The balance version this mutation produced.
    pub version: i64,
    /// Post-mutation held amount.
    pub authorized: Amount,
    /// Post-mutation settled amount.
    pub actual: Amount,
    pub operation: OperationKind,
    /// Originating request/event id, when the caller supplied one. Unique
    /// across records: the idempotency key for re-delivered events.
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Snapshot the outcome of a mutation. Seq is assigned by the
    /// repository on append.
    pub fn for_mutation(
        number: String,
        balance: &Balance,
        operation: OperationKind,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            seq: 0,
            number,
            account_id: balance.account_id,
            version: balance.version,
            authorized: balance.authorized,
            actual: balance.actual,
            operation,
            correlation_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_record_captures_post_mutation_state() {
        let mut balance = Balance::new(Uuid::new_v4());
        balance.actual = dec!(150);
        balance.authorized = dec!(40);
        balance.version = 7;

        let record = AuditRecord::for_mutation(
            "00000000000000000042".into(),
            &balance,
            OperationKind::Reserve,
            Some("pay-123".into()),
        );

        assert_eq!(record.account_id, balance.account_id);
        assert_eq!(record.version, 7);
        assert_eq!(record.authorized, dec!(40));
        assert_eq!(record.actual, dec!(150));
        assert_eq!(record.operation, OperationKind::Reserve);
        assert_eq!(record.correlation_id.as_deref(), Some("pay-123"));
    }
}
