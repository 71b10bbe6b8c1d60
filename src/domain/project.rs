use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type ProjectId = Uuid;
pub type InvestmentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Open,
    Funded,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Open => "open",
            ProjectStatus::Funded => "funded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(ProjectStatus::Open),
            "funded" => Some(ProjectStatus::Funded),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A crowdfunded project owned by a user. `current_cents` is the sum of
/// confirmed investments only; pending requests contribute nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: AccountId,
    pub title: String,
    pub goal_cents: Cents,
    pub current_cents: Cents,
    pub status: ProjectStatus,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(owner_id: AccountId, title: String, goal_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title,
            goal_cents,
            current_cents: 0,
            status: ProjectStatus::Open,
            deadline: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Compute the state after confirming an investment: the new funding
    /// total and the resulting status. `Funded` is one-way, mirroring goal
    /// achievement.
    pub fn apply_confirmed(&self, amount_cents: Cents) -> (Cents, ProjectStatus) {
        let updated = self.current_cents + amount_cents;
        let status = if self.status == ProjectStatus::Funded || updated >= self.goal_cents {
            ProjectStatus::Funded
        } else {
            ProjectStatus::Open
        };
        (updated, status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Pending,
    Confirmed,
    Declined,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Confirmed => "confirmed",
            InvestmentStatus::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(InvestmentStatus::Pending),
            "confirmed" => Some(InvestmentStatus::Confirmed),
            "declined" => Some(InvestmentStatus::Declined),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            InvestmentStatus::Pending => false,
            InvestmentStatus::Confirmed | InvestmentStatus::Declined => true,
        }
    }

    /// Apply an owner decision. Pending is the only state a decision can be
    /// made from; terminal states are immutable.
    pub fn decide(self, decision: Decision) -> Result<InvestmentStatus, TransitionError> {
        match self {
            InvestmentStatus::Pending => Ok(match decision {
                Decision::Confirm => InvestmentStatus::Confirmed,
                Decision::Decline => InvestmentStatus::Declined,
            }),
            from => Err(TransitionError { from }),
        }
    }
}

impl std::fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project owner's verdict on a pending investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: InvestmentStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "investment already decided: {}", self.from)
    }
}

impl std::error::Error for TransitionError {}

/// An investor's stated intent to fund a project. No money moves at request
/// time, and none moves on acceptance either — only the project's funding
/// total changes (pledge without escrow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub project_id: ProjectId,
    pub investor_id: AccountId,
    pub amount_cents: Cents,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Investment {
    pub fn new(project_id: ProjectId, investor_id: AccountId, amount_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            investor_id,
            amount_cents,
            status: InvestmentStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        }
    }
}
