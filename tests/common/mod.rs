// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use fiscus::application::LedgerService;
use fiscus::clients::AllowAllOwners;
use fiscus::domain::{Account, AccountStatus, Amount, OwnerType};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service =
        LedgerService::init(db_path.to_str().unwrap(), Arc::new(AllowAllOwners)).await?;
    Ok((service, temp_dir))
}

/// Open and activate an account, ready for balance operations.
pub async fn open_active_account(service: &LedgerService) -> Result<Account> {
    let account = service
        .open_account(OwnerType::User, 42, "EUR".into())
        .await?;
    let account = service
        .update_status(account.id, AccountStatus::Active)
        .await?;
    Ok(account)
}

/// Open, activate and fund an account with settled funds.
pub async fn funded_account(service: &LedgerService, amount: Amount) -> Result<Account> {
    let account = open_active_account(service).await?;
    service.increase(account.id, amount).await?;
    Ok(account)
}
