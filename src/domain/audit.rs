use serde::{Deserialize, Serialize};

use super::{Cents, format_cents};

/// Stored-vs-replayed balance for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub holder: String,
    pub stored_cents: Cents,
    pub replayed_cents: Cents,
}

/// Stored funding total vs the sum of confirmed investments for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCheck {
    pub title: String,
    pub stored_cents: Cents,
    pub confirmed_cents: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditIssue {
    /// Stored balance disagrees with the ledger replay.
    BalanceMismatch {
        holder: String,
        stored_cents: Cents,
        replayed_cents: Cents,
    },
    /// An account balance went below zero.
    NegativeBalance { holder: String, balance_cents: Cents },
    /// Ledger entries with a non-positive amount.
    NonPositiveAmounts { count: i64 },
    /// Holes in the ledger sequence (entries lost or tampered with).
    SequenceGaps,
    /// Entries referencing accounts or goals that no longer exist.
    OrphanEntries { count: i64 },
    /// Project funding total disagrees with its confirmed investments.
    ProjectTotalMismatch {
        title: String,
        stored_cents: Cents,
        confirmed_cents: Cents,
    },
}

impl std::fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditIssue::BalanceMismatch {
                holder,
                stored_cents,
                replayed_cents,
            } => write!(
                f,
                "balance mismatch for '{}': stored {} but ledger replays to {}",
                holder,
                format_cents(*stored_cents),
                format_cents(*replayed_cents)
            ),
            AuditIssue::NegativeBalance {
                holder,
                balance_cents,
            } => write!(
                f,
                "negative balance for '{}': {}",
                holder,
                format_cents(*balance_cents)
            ),
            AuditIssue::NonPositiveAmounts { count } => {
                write!(f, "{} ledger entries with non-positive amounts", count)
            }
            AuditIssue::SequenceGaps => write!(f, "gaps in the ledger sequence"),
            AuditIssue::OrphanEntries { count } => {
                write!(f, "{} entries referencing missing accounts or goals", count)
            }
            AuditIssue::ProjectTotalMismatch {
                title,
                stored_cents,
                confirmed_cents,
            } => write!(
                f,
                "project '{}' stores {} but confirmed investments sum to {}",
                title,
                format_cents(*stored_cents),
                format_cents(*confirmed_cents)
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub account_count: i64,
    pub entry_count: i64,
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cross-check the stored state against the append-only ledger.
pub fn build_audit_report(
    balances: &[BalanceCheck],
    projects: &[ProjectCheck],
    entry_count: i64,
    has_sequence_gaps: bool,
    non_positive_amounts: i64,
    orphan_entries: i64,
) -> AuditReport {
    let mut issues = Vec::new();

    for check in balances {
        if check.stored_cents != check.replayed_cents {
            issues.push(AuditIssue::BalanceMismatch {
                holder: check.holder.clone(),
                stored_cents: check.stored_cents,
                replayed_cents: check.replayed_cents,
            });
        }
        if check.stored_cents < 0 {
            issues.push(AuditIssue::NegativeBalance {
                holder: check.holder.clone(),
                balance_cents: check.stored_cents,
            });
        }
    }

    for check in projects {
        if check.stored_cents != check.confirmed_cents {
            issues.push(AuditIssue::ProjectTotalMismatch {
                title: check.title.clone(),
                stored_cents: check.stored_cents,
                confirmed_cents: check.confirmed_cents,
            });
        }
    }

    if non_positive_amounts > 0 {
        issues.push(AuditIssue::NonPositiveAmounts {
            count: non_positive_amounts,
        });
    }
    if has_sequence_gaps {
        issues.push(AuditIssue::SequenceGaps);
    }
    if orphan_entries > 0 {
        issues.push(AuditIssue::OrphanEntries {
            count: orphan_entries,
        });
    }

    AuditReport {
        account_count: balances.len() as i64,
        entry_count,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(holder: &str, stored: Cents, replayed: Cents) -> BalanceCheck {
        BalanceCheck {
            holder: holder.into(),
            stored_cents: stored,
            replayed_cents: replayed,
        }
    }

    #[test]
    fn test_clean_ledger_reports_ok() {
        let balances = vec![balance("alice", 80_000, 80_000), balance("bob", 120_000, 120_000)];
        let report = build_audit_report(&balances, &[], 4, false, 0, 0);
        assert!(report.is_ok());
        assert_eq!(report.account_count, 2);
        assert_eq!(report.entry_count, 4);
    }

    #[test]
    fn test_balance_mismatch_is_flagged() {
        let balances = vec![balance("alice", 80_000, 79_000)];
        let report = build_audit_report(&balances, &[], 1, false, 0, 0);
        assert!(!report.is_ok());
        assert!(matches!(
            report.issues[0],
            AuditIssue::BalanceMismatch { .. }
        ));
    }

    #[test]
    fn test_negative_balance_is_flagged() {
        let balances = vec![balance("alice", -100, -100)];
        let report = build_audit_report(&balances, &[], 0, false, 0, 0);
        assert!(matches!(
            report.issues[0],
            AuditIssue::NegativeBalance { .. }
        ));
    }

    #[test]
    fn test_project_total_mismatch_is_flagged() {
        let projects = vec![ProjectCheck {
            title: "Atelier".into(),
            stored_cents: 50_000,
            confirmed_cents: 40_000,
        }];
        let report = build_audit_report(&[], &projects, 0, false, 0, 0);
        assert!(matches!(
            report.issues[0],
            AuditIssue::ProjectTotalMismatch { .. }
        ));
    }

    #[test]
    fn test_structural_issues_are_flagged() {
        let report = build_audit_report(&[], &[], 10, true, 2, 3);
        assert_eq!(report.issues.len(), 3);
    }
}
