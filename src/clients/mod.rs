use anyhow::Result;
use async_trait::async_trait;

use crate::domain::OwnerType;

/// Lookup of account owners in the user/project services. The ledger only
/// needs existence: an account may not be opened for an unknown owner.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn exists(&self, owner_type: OwnerType, owner_id: i64) -> Result<bool>;
}

/// Stand-in directory that accepts every owner. Used by the CLI and tests
/// when no directory service is wired in.
pub struct AllowAllOwners;

#[async_trait]
impl OwnerDirectory for AllowAllOwners {
    async fn exists(&self, _owner_type: OwnerType, _owner_id: i64) -> Result<bool> {
        Ok(true)
    }
}
