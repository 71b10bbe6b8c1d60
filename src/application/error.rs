use thiserror::Error;

use crate::domain::{Cents, InvestmentStatus, format_cents};

/// Everything a ledger operation can fail with. Validation errors are
/// detected before any mutation; storage errors abort the transaction scope.
/// Every message is suitable for direct display and leaks no storage detail.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("No account matches that card number and national id")]
    RecipientNotFound,

    #[error("Cannot transfer to your own account")]
    SelfTransfer,

    #[error("Cannot invest in your own project")]
    SelfInvestment,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds. Current balance: {}", format_cents(*.balance))]
    InsufficientFunds { balance: Cents },

    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Investment not found: {0}")]
    InvestmentNotFound(String),

    #[error("Investment already decided: {from}")]
    InvalidStateTransition { from: InvestmentStatus },

    #[error("Only the project owner can decide on an investment")]
    NotProjectOwner,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Account is blocked")]
    UserBlocked,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Storage timed out")]
    StorageTimeout,

    #[error("Storage unavailable")]
    StorageUnavailable,

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

/// Classify storage failures out of the repository's error chain. Pool
/// exhaustion maps to a timeout the caller may retry from scratch; transport
/// failures to unavailability; everything else stays a database error.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let classified = err.chain().find_map(|cause| {
            cause
                .downcast_ref::<sqlx::Error>()
                .and_then(|sqlx_err| match sqlx_err {
                    sqlx::Error::PoolTimedOut => Some(AppError::StorageTimeout),
                    sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                        Some(AppError::StorageUnavailable)
                    }
                    _ => None,
                })
        });
        classified.unwrap_or(AppError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_carries_balance() {
        let err = AppError::InsufficientFunds { balance: 4200 };
        assert_eq!(err.to_string(), "Insufficient funds. Current balance: 42.00");
    }

    #[test]
    fn test_pool_timeout_classification() {
        let err = anyhow::Error::from(sqlx::Error::PoolTimedOut).context("Failed to begin");
        assert!(matches!(AppError::from(err), AppError::StorageTimeout));
    }

    #[test]
    fn test_unclassified_errors_stay_database() {
        let err = anyhow::anyhow!("constraint violated");
        assert!(matches!(AppError::from(err), AppError::Database(_)));
    }
}
