//! The ledger operation executor: the single write path for balances.
//!
//! Every balance-affecting service delegates here; nothing else in the crate
//! touches `balance_cents`. An execution is one atomic unit: validate the
//! amount, fresh-read the debit balance inside the transaction, apply the
//! guarded debit, apply the optional credit, append exactly one ledger entry.
//! Any failure aborts the whole scope — a partially applied operation is
//! never observable.

use sqlx::SqliteConnection;

use crate::domain::{LedgerEntry, LedgerOperation};
use crate::storage::Repository;

use super::AppError;

/// Execute an operation inside a caller-owned transaction. The caller
/// commits; dropping the transaction on error rolls everything back,
/// including any work the caller did in the same scope.
pub async fn execute_in(
    conn: &mut SqliteConnection,
    op: &LedgerOperation,
) -> Result<LedgerEntry, AppError> {
    if op.amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "amount must be positive".to_string(),
        ));
    }

    let balance = Repository::balance_of(&mut *conn, op.debit_account)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(op.debit_account.to_string()))?;

    if balance < op.amount_cents {
        return Err(AppError::InsufficientFunds { balance });
    }

    // The guard re-validates at write time. With the pool capped at one
    // connection it cannot fire after the check above, but it keeps the
    // double-spend race lost even if the pool is ever widened.
    let debited = Repository::debit_balance(&mut *conn, op.debit_account, op.amount_cents).await?;
    if !debited {
        let balance = Repository::balance_of(&mut *conn, op.debit_account)
            .await?
            .unwrap_or(0);
        return Err(AppError::InsufficientFunds { balance });
    }

    if let Some(credit_account) = op.credit_account {
        Repository::credit_balance(&mut *conn, credit_account, op.amount_cents).await?;
    }

    let mut entry = op.entry();
    Repository::insert_entry(&mut *conn, &mut entry).await?;

    Ok(entry)
}

/// Execute an operation in its own transaction scope.
pub async fn execute(repo: &Repository, op: &LedgerOperation) -> Result<LedgerEntry, AppError> {
    let mut tx = repo.begin().await?;
    let entry = execute_in(&mut tx, op).await?;
    tx.commit()
        .await
        .map_err(|e| AppError::from(anyhow::Error::from(e).context("Failed to commit ledger operation")))?;
    Ok(entry)
}
