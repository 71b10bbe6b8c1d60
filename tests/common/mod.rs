// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use cagnotte::application::{BankService, Session};
use cagnotte::domain::{Account, Cents, Role};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: standard account setup. Every account starts with the
/// default opening balance of 1000.00.
pub struct StandardAccounts;

impl StandardAccounts {
    /// Create the basic account set: alice, bob (users) and root (admin)
    pub async fn create(service: &BankService) -> Result<()> {
        service
            .open_account("alice".into(), "FR-0001".into(), Role::User)
            .await?;
        service
            .open_account("bob".into(), "FR-0002".into(), Role::User)
            .await?;
        service
            .open_account("root".into(), "FR-0000".into(), Role::Admin)
            .await?;
        Ok(())
    }

    pub async fn account(service: &BankService, holder: &str) -> Result<Account> {
        Ok(service.get_account(holder).await?)
    }

    /// An authenticated session for the given holder
    pub async fn session(service: &BankService, holder: &str) -> Result<Session> {
        let account = service.get_account(holder).await?;
        Ok(Session::authenticated(account.id))
    }

    /// Total of all stored balances, for conservation assertions
    pub async fn total_balance(service: &BankService) -> Result<Cents> {
        let accounts = service.list_accounts().await?;
        Ok(accounts.iter().map(|a| a.balance_cents).sum())
    }
}
