mod common;

use anyhow::Result;
use common::{funded_account, open_active_account, test_service};
use fiscus::application::LedgerError;
use fiscus::domain::{AccountStatus, OwnerType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn test_open_account_starts_pending_with_zeroed_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .open_account(OwnerType::User, 7, "EUR".into())
        .await?;

    assert_eq!(account.status, AccountStatus::Pending);
    assert_eq!(account.number.len(), 20);

    let view = service.get_balance(account.id).await?;
    assert_eq!(view.actual, Decimal::ZERO);
    assert_eq!(view.authorized, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn test_account_numbers_are_unique() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = service
        .open_account(OwnerType::User, 1, "EUR".into())
        .await?;
    let second = service
        .open_account(OwnerType::Project, 2, "EUR".into())
        .await?;

    assert_ne!(first.number, second.number);

    Ok(())
}

#[tokio::test]
async fn test_pending_account_refuses_mutations() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service
        .open_account(OwnerType::User, 7, "EUR".into())
        .await?;

    let err = service.increase(account.id, dec!(100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InactiveAccount { .. }));

    Ok(())
}

#[tokio::test]
async fn test_activation_enables_mutations() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = open_active_account(&service).await?;
    let view = service.increase(account.id, dec!(100)).await?;
    assert_eq!(view.actual, dec!(100));

    Ok(())
}

#[tokio::test]
async fn test_frozen_account_refuses_mutations() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = funded_account(&service, dec!(100)).await?;
    service
        .update_status(account.id, AccountStatus::Frozen)
        .await?;

    let err = service.decrease(account.id, dec!(10)).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InactiveAccount {
            status: AccountStatus::Frozen,
            ..
        }
    ));

    Ok(())
}

#[tokio::test]
async fn test_closed_account_is_terminal() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = open_active_account(&service).await?;
    let closed = service
        .update_status(account.id, AccountStatus::Closed)
        .await?;
    assert!(closed.closed_at.is_some());

    let err = service
        .update_status(account.id, AccountStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountClosed(_)));

    Ok(())
}

#[tokio::test]
async fn test_balance_survives_account_closure() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = funded_account(&service, dec!(250)).await?;
    service
        .update_status(account.id, AccountStatus::Closed)
        .await?;

    // Mutations are refused, but the balance stays readable as history.
    let view = service.get_balance(account.id).await?;
    assert_eq!(view.actual, dec!(250));

    let err = service.decrease(account.id, dec!(10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InactiveAccount { .. }));

    Ok(())
}

#[tokio::test]
async fn test_unknown_account_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.increase(Uuid::new_v4(), dec!(10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_account_lookup_by_number() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = open_active_account(&service).await?;
    let found = service.get_account_by_number(&account.number).await?;
    assert_eq!(found.id, account.id);

    Ok(())
}
