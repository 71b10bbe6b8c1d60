use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, AccountId, Cents, GoalId};

pub type EntryId = Uuid;

/// What kind of balance movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Peer-to-peer movement: debit one account, credit another.
    Transfer,
    /// One-way debit against an external biller.
    Bill,
    /// One-way debit into a savings goal's tracked amount.
    GoalFunding,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Transfer => "transfer",
            EntryKind::Bill => "bill",
            EntryKind::GoalFunding => "goal_funding",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "transfer" => Some(EntryKind::Transfer),
            "bill" => Some(EntryKind::Bill),
            "goal_funding" => Some(EntryKind::GoalFunding),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable, append-only fact describing one committed balance movement.
/// Entries are never updated or deleted; they are the sole audit trail for
/// "how did this balance change".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Monotonically increasing sequence number for ordering
    pub sequence: i64,
    /// Debited account (balance decreases)
    pub account_id: AccountId,
    /// Credited account, when the movement has one (transfers only)
    pub counterparty_id: Option<AccountId>,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    pub kind: EntryKind,
    pub description: Option<String>,
    /// Bill reference for `Bill` entries
    pub reference: Option<String>,
    /// Funded goal for `GoalFunding` entries
    pub goal_id: Option<GoalId>,
    /// Caller-supplied token: a repeated submission with the same key is
    /// answered with the original entry instead of a second debit
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Description of a balance-affecting operation before it is executed:
/// a debit account, an optional credit account, an amount and a record kind.
/// The executor is the only code that turns one of these into balance
/// mutations and a committed `LedgerEntry`.
#[derive(Debug, Clone)]
pub struct LedgerOperation {
    pub debit_account: AccountId,
    pub credit_account: Option<AccountId>,
    pub amount_cents: Cents,
    pub kind: EntryKind,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub goal_id: Option<GoalId>,
    pub idempotency_key: Option<String>,
}

impl LedgerOperation {
    pub fn transfer(from: AccountId, to: AccountId, amount_cents: Cents) -> Self {
        Self {
            debit_account: from,
            credit_account: Some(to),
            amount_cents,
            kind: EntryKind::Transfer,
            description: None,
            reference: None,
            goal_id: None,
            idempotency_key: None,
        }
    }

    pub fn bill(account: AccountId, amount_cents: Cents, reference: impl Into<String>) -> Self {
        Self {
            debit_account: account,
            credit_account: None,
            amount_cents,
            kind: EntryKind::Bill,
            description: None,
            reference: Some(reference.into()),
            goal_id: None,
            idempotency_key: None,
        }
    }

    pub fn goal_funding(account: AccountId, amount_cents: Cents, goal_id: GoalId) -> Self {
        Self {
            debit_account: account,
            credit_account: None,
            amount_cents,
            kind: EntryKind::GoalFunding,
            description: None,
            reference: None,
            goal_id: Some(goal_id),
            idempotency_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Materialize the entry this operation will append. The sequence number
    /// must be assigned by the repository when the entry is inserted.
    pub fn entry(&self) -> LedgerEntry {
        assert!(self.amount_cents > 0, "Ledger entry amount must be positive");
        LedgerEntry {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            account_id: self.debit_account,
            counterparty_id: self.credit_account,
            amount_cents: self.amount_cents,
            kind: self.kind,
            description: self.description.clone(),
            reference: self.reference.clone(),
            goal_id: self.goal_id,
            idempotency_key: self.idempotency_key.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Replay an account's ledger entries on top of its opening balance.
/// The result must equal the stored balance; the audit checks exactly this.
pub fn replay_balance(account: &Account, entries: &[LedgerEntry]) -> Cents {
    entries
        .iter()
        .fold(account.opening_balance_cents, |balance, entry| {
            if entry.account_id == account.id {
                balance - entry.amount_cents
            } else if entry.counterparty_id == Some(account.id) {
                balance + entry.amount_cents
            } else {
                balance
            }
        })
}

/// Total money leaving the system through one-way debits (bills, goal
/// funding). Conservation: the drop in the sum of all balances across any
/// entry list equals exactly this amount.
pub fn total_outflow(entries: &[LedgerEntry]) -> Cents {
    entries
        .iter()
        .filter(|e| e.counterparty_id.is_none())
        .map(|e| e.amount_cents)
        .sum()
}
