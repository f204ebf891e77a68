use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::{AccountId, Amount, OperationKind};

use super::{BalanceView, LedgerError, LedgerService};

/// A payment-authorization event as delivered on the message topic. The
/// operation id doubles as the idempotency key: re-deliveries of the same
/// event must not apply twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub operation_id: String,
    pub account_id: AccountId,
    pub amount: Amount,
    pub operation: OperationKind,
}

/// Transport-agnostic boundary for asynchronous payment-authorization
/// processing. The transport delivers raw payloads and acknowledges on
/// `Ok`; any `Err` leaves the message unacknowledged for redelivery.
///
/// [`LedgerError::MalformedEvent`] marks payloads that will never decode,
/// so a transport can route them to a dead-letter queue after its
/// redelivery budget instead of looping forever.
pub struct PaymentEventProcessor {
    service: Arc<LedgerService>,
}

impl PaymentEventProcessor {
    pub fn new(service: Arc<LedgerService>) -> Self {
        Self { service }
    }

    /// Decode and process one delivery.
    pub async fn handle(&self, payload: &str) -> Result<BalanceView, LedgerError> {
        let event: PaymentEvent = serde_json::from_str(payload).map_err(|err| {
            error!("Malformed payment event: {}", err);
            LedgerError::MalformedEvent(err.to_string())
        })?;
        self.process(event).await
    }

    /// Apply a decoded event idempotently: a previously seen operation id
    /// returns the recorded result without a new mutation.
    pub async fn process(&self, event: PaymentEvent) -> Result<BalanceView, LedgerError> {
        info!(
            "Received payment event {} ({} {} on account {})",
            event.operation_id, event.operation, event.amount, event.account_id
        );
        self.service
            .apply(
                event.account_id,
                event.operation,
                event.amount,
                Some(&event.operation_id),
            )
            .await
    }
}
