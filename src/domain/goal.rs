use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type GoalId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Achieved,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Achieved => "achieved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in_progress" => Some(GoalStatus::InProgress),
            "achieved" => Some(GoalStatus::Achieved),
            _ => None,
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A savings goal. `current_cents` grows only through funding operations and
/// is not clamped at the target; the status flips to `Achieved` exactly when
/// the target is reached and never flips back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub owner_id: AccountId,
    pub title: String,
    pub target_cents: Cents,
    pub current_cents: Cents,
    pub deadline: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(owner_id: AccountId, title: String, target_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title,
            target_cents,
            current_cents: 0,
            deadline: None,
            status: GoalStatus::InProgress,
            created_at: Utc::now(),
        }
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_achieved(&self) -> bool {
        self.status == GoalStatus::Achieved
    }

    /// Compute the state after a contribution: the new tracked amount and the
    /// resulting status. Achievement is one-way; an already-achieved goal
    /// stays achieved regardless of the numbers.
    pub fn apply_contribution(&self, amount_cents: Cents) -> (Cents, GoalStatus) {
        let updated = self.current_cents + amount_cents;
        let status = if self.is_achieved() || updated >= self.target_cents {
            GoalStatus::Achieved
        } else {
            GoalStatus::InProgress
        };
        (updated, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_with(target: Cents, current: Cents) -> Goal {
        let mut goal = Goal::new(Uuid::new_v4(), "Vacances".into(), target);
        goal.current_cents = current;
        goal
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [GoalStatus::InProgress, GoalStatus::Achieved] {
            assert_eq!(GoalStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(GoalStatus::from_str("done"), None);
    }

    #[test]
    fn test_contribution_below_target() {
        let goal = goal_with(100_000, 0);
        let (updated, status) = goal.apply_contribution(40_000);
        assert_eq!(updated, 40_000);
        assert_eq!(status, GoalStatus::InProgress);
    }

    #[test]
    fn test_contribution_reaching_target() {
        let goal = goal_with(100_000, 90_000);
        let (updated, status) = goal.apply_contribution(10_000);
        assert_eq!(updated, 100_000);
        assert_eq!(status, GoalStatus::Achieved);
    }

    #[test]
    fn test_overfunding_is_stored_not_clamped() {
        let goal = goal_with(100_000, 90_000);
        let (updated, status) = goal.apply_contribution(15_000);
        assert_eq!(updated, 105_000);
        assert_eq!(status, GoalStatus::Achieved);
    }

    #[test]
    fn test_achieved_is_one_way() {
        let mut goal = goal_with(100_000, 120_000);
        goal.status = GoalStatus::Achieved;
        // Even if the target were later raised above the tracked amount,
        // further contributions never revert an achieved goal.
        goal.target_cents = 500_000;
        let (updated, status) = goal.apply_contribution(1_000);
        assert_eq!(updated, 121_000);
        assert_eq!(status, GoalStatus::Achieved);
    }

    #[test]
    fn test_contributions_are_monotonic() {
        let goal = goal_with(100_000, 30_000);
        let (updated, _) = goal.apply_contribution(1);
        assert!(updated > goal.current_cents);
    }
}
