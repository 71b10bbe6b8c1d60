use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BankService, Session};
use crate::domain::{Account, Goal, Investment, LedgerEntry, Project, format_cents};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub entries: Vec<LedgerEntry>,
    pub goals: Vec<Goal>,
    pub projects: Vec<Project>,
    pub investments: Vec<Investment>,
}

/// Exporter for converting ledger data to external formats
pub struct Exporter<'a> {
    service: &'a BankService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a BankService) -> Self {
        Self { service }
    }

    /// Export an account statement to CSV, newest entry first.
    pub async fn export_statement_csv<W: Write>(
        &self,
        session: &Session,
        holder: &str,
        writer: W,
    ) -> Result<usize> {
        let entries = self.service.list_transactions(session, holder).await?;
        let names = self.service.account_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "date",
            "kind",
            "debited",
            "credited",
            "amount",
            "description",
            "reference",
        ])?;

        let mut count = 0;
        for entry in &entries {
            let debited = names
                .get(&entry.account_id)
                .cloned()
                .unwrap_or_else(|| entry.account_id.to_string());
            let credited = entry
                .counterparty_id
                .map(|id| {
                    names
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| id.to_string())
                })
                .unwrap_or_default();

            csv_writer.write_record([
                entry.sequence.to_string(),
                entry.created_at.to_rfc3339(),
                entry.kind.to_string(),
                debited,
                credited,
                format_cents(entry.amount_cents),
                entry.description.clone().unwrap_or_default(),
                entry.reference.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full dataset as a JSON snapshot.
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let accounts = self.service.list_accounts().await?;
        let entries = self.service.list_all_entries().await?;
        let goals = self.service.list_goals().await?;
        let projects = self.service.list_projects().await?;

        let mut investments = Vec::new();
        for project in &projects {
            investments.extend(self.service.list_investments(project.id).await?);
        }

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            entries,
            goals,
            projects,
            investments,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
