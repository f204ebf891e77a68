mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{funded_account, test_service};
use fiscus::application::{LedgerError, PaymentEvent, PaymentEventProcessor};
use fiscus::domain::OperationKind;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_event_applies_operation_with_correlation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, dec!(1000)).await?;

    let service = Arc::new(service);
    let processor = PaymentEventProcessor::new(service.clone());

    let payload = json!({
        "operation_id": "auth-1001",
        "account_id": account.id,
        "amount": "250",
        "operation": "reserve",
    })
    .to_string();

    let view = processor.handle(&payload).await?;
    assert_eq!(view.authorized, dec!(250));
    assert_eq!(view.actual, dec!(1000));

    let records = service.history(account.id).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].correlation_id.as_deref(), Some("auth-1001"));

    Ok(())
}

#[tokio::test]
async fn test_redelivered_event_is_idempotent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, dec!(1000)).await?;

    let service = Arc::new(service);
    let processor = PaymentEventProcessor::new(service.clone());

    let payload = json!({
        "operation_id": "auth-2002",
        "account_id": account.id,
        "amount": "100",
        "operation": "decrease",
    })
    .to_string();

    let first = processor.handle(&payload).await?;
    let second = processor.handle(&payload).await?;

    // The replay returns the recorded result without applying again.
    assert_eq!(first.actual, dec!(900));
    assert_eq!(second.actual, dec!(900));

    let records = service.history(account.id).await?;
    assert_eq!(records.len(), 2, "replay must not append a record");
    assert_eq!(records.last().unwrap().version, 3);

    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_is_distinguishable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let processor = PaymentEventProcessor::new(Arc::new(service));

    for payload in ["not json at all", "{\"operation_id\": 17}"] {
        let err = processor.handle(payload).await.unwrap_err();
        assert!(matches!(err, LedgerError::MalformedEvent(_)));
    }

    Ok(())
}

#[tokio::test]
async fn test_event_for_unknown_account_is_not_acknowledged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let processor = PaymentEventProcessor::new(Arc::new(service));

    let event = PaymentEvent {
        operation_id: "auth-3003".into(),
        account_id: Uuid::new_v4(),
        amount: dec!(50),
        operation: OperationKind::Increase,
    };

    let err = processor.process(event).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_release_event_after_reserve_event() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, dec!(500)).await?;

    let service = Arc::new(service);
    let processor = PaymentEventProcessor::new(service.clone());

    processor
        .process(PaymentEvent {
            operation_id: "auth-4004".into(),
            account_id: account.id,
            amount: dec!(200),
            operation: OperationKind::Reserve,
        })
        .await?;

    let view = processor
        .process(PaymentEvent {
            operation_id: "auth-4005".into(),
            account_id: account.id,
            amount: dec!(200),
            operation: OperationKind::Release,
        })
        .await?;

    assert_eq!(view.authorized, dec!(0));
    assert_eq!(view.actual, dec!(300));

    Ok(())
}
