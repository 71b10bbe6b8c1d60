use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// Starting balance seeded into every account at registration.
pub const DEFAULT_OPENING_CENTS: Cents = 100_000;

/// Closed set of roles. Authorization checkpoints match on this exhaustively;
/// free-form role strings are never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user account holding a balance. The balance is mutated only by ledger
/// operations; `opening_balance_cents` is immutable so the full ledger can be
/// replayed against the stored balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Display name, unique across accounts (CLI handle).
    pub holder: String,
    pub national_id: String,
    /// Derived at registration: 16 digits, Luhn-valid, globally unique.
    pub card_number: String,
    pub role: Role,
    pub blocked: bool,
    pub balance_cents: Cents,
    pub opening_balance_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(holder: String, national_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            holder,
            national_id,
            card_number: derive_card_number(),
            role: Role::User,
            blocked: false,
            balance_cents: DEFAULT_OPENING_CENTS,
            opening_balance_cents: DEFAULT_OPENING_CENTS,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_opening_balance(mut self, cents: Cents) -> Self {
        self.balance_cents = cents;
        self.opening_balance_cents = cents;
        self
    }
}

/// Derive a fresh 16-digit card number: a fixed issuer digit, 14 random
/// digits, and a Luhn check digit. Randomness comes from a v4 UUID so the
/// derivation needs no extra dependency; uniqueness is enforced by the store.
pub fn derive_card_number() -> String {
    let seed = Uuid::new_v4();
    let mut digits: Vec<u8> = Vec::with_capacity(16);
    digits.push(4);
    digits.extend(seed.as_bytes().iter().take(14).map(|b| b % 10));
    digits.push(luhn_check_digit(&digits));
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// Check a full card number (payload + check digit) against the Luhn formula.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Compute the Luhn check digit for a payload (the digits before the check
/// digit). The payload's last digit is doubled once the check digit is
/// appended, so doubling starts at the rightmost payload position.
fn luhn_check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = d as u32;
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}
