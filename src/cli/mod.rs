use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{BankService, Session};
use crate::domain::{Role, format_cents, parse_cents};
use crate::io::Exporter;

/// Cagnotte - Community Banking Ledger
#[derive(Parser)]
#[command(name = "cagnotte")]
#[command(about = "A community banking ledger with savings goals and crowdfunded projects")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "CAGNOTTE_DB", default_value = "cagnotte.db")]
    pub database: String,

    /// Act as this account holder (omit for anonymous)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transfer money to another account
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Recipient card number
        #[arg(long)]
        card: String,

        /// Recipient national id (must match the card)
        #[arg(long)]
        national_id: String,

        /// Description of the transfer
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show balance for an account (defaults to --user)
    Balance {
        /// Account holder name
        holder: Option<String>,
    },

    /// List an account's ledger entries, newest first (defaults to --user)
    Transactions {
        /// Account holder name
        holder: Option<String>,
    },

    /// Bill payment commands
    #[command(subcommand)]
    Bill(BillCommands),

    /// Savings goal commands
    #[command(subcommand)]
    Goal(GoalCommands),

    /// Crowdfunded project commands
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Investment workflow commands
    #[command(subcommand)]
    Invest(InvestCommands),

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: statement, snapshot
        export_type: String,

        /// Account holder for statement export (defaults to --user)
        #[arg(long)]
        holder: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Register a new account
    Open {
        /// Account holder name (must be unique)
        holder: String,

        /// National id of the holder
        #[arg(long)]
        national_id: String,

        /// Role: admin, moderator, user
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// List all accounts
    List,

    /// Show detailed account information
    Show {
        /// Account holder name
        holder: String,
    },

    /// Block an account (admins and moderators only)
    Block {
        /// Account holder name
        holder: String,
    },

    /// Unblock an account (admins and moderators only)
    Unblock {
        /// Account holder name
        holder: String,
    },
}

#[derive(Subcommand)]
pub enum BillCommands {
    /// Pay a bill from your balance
    Pay {
        /// Biller reference (e.g., invoice number)
        reference: String,

        /// Amount to pay (e.g., "50.00" or "50")
        amount: String,

        /// Idempotency key: a repeated payment with the same key is not
        /// debited twice
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// List your bill payments
    List,
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a new savings goal
    Create {
        /// Goal title
        title: String,

        /// Target amount (e.g., "1000.00")
        #[arg(short, long)]
        target: String,

        /// Optional deadline (ISO 8601 format: YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },

    /// List all goals
    List,

    /// Fund a goal from your balance
    Fund {
        /// Goal ID
        id: String,

        /// Amount to contribute (e.g., "50.00")
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a new crowdfunded project
    Create {
        /// Project title
        title: String,

        /// Funding goal (e.g., "5000.00")
        #[arg(short, long)]
        goal: String,

        /// Optional deadline (ISO 8601 format: YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },

    /// List all projects
    List,
}

#[derive(Subcommand)]
pub enum InvestCommands {
    /// Request to invest in a project (no money moves until accepted)
    Request {
        /// Project ID
        project_id: String,

        /// Pledged amount (e.g., "100.00")
        amount: String,
    },

    /// Accept a pending investment on your project
    Accept {
        /// Investment ID
        id: String,
    },

    /// Decline a pending investment on your project
    Decline {
        /// Investment ID
        id: String,
    },

    /// List investments on a project
    List {
        /// Project ID
        project_id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            BankService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = BankService::connect(&self.database).await?;
        let session = resolve_session(&service, self.user.as_deref()).await?;

        match self.command {
            Commands::Init => unreachable!("handled above"),

            Commands::Account(account_cmd) => {
                run_account_command(&service, &session, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                card,
                national_id,
                description,
            } => {
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let receipt = service
                    .transfer(&session, &card, &national_id, amount_cents, description)
                    .await?;

                println!(
                    "Transferred {} from {} to {} ({})",
                    format_cents(receipt.entry.amount_cents),
                    receipt.sender_holder,
                    receipt.recipient_holder,
                    receipt.entry.id
                );
            }

            Commands::Balance { holder } => {
                let holder = holder_or_user(holder.as_deref(), self.user.as_deref())?;
                let balance = service.get_balance(holder).await?;
                println!("{}: {}", holder, format_cents(balance));
            }

            Commands::Transactions { holder } => {
                let holder = holder_or_user(holder.as_deref(), self.user.as_deref())?;
                run_transactions_command(&service, &session, holder).await?;
            }

            Commands::Bill(bill_cmd) => {
                run_bill_command(&service, &session, bill_cmd).await?;
            }

            Commands::Goal(goal_cmd) => {
                run_goal_command(&service, &session, goal_cmd).await?;
            }

            Commands::Project(project_cmd) => {
                run_project_command(&service, &session, project_cmd).await?;
            }

            Commands::Invest(invest_cmd) => {
                run_invest_command(&service, &session, invest_cmd).await?;
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                holder,
                output,
            } => {
                let holder = holder.or(self.user);
                run_export_command(&service, &session, &export_type, holder.as_deref(), output)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Resolve the --user flag into a session. An unknown holder is an error;
/// no flag means an anonymous session (read-only commands only).
async fn resolve_session(service: &BankService, user: Option<&str>) -> Result<Session> {
    match user {
        Some(holder) => {
            let account = service
                .get_account(holder)
                .await
                .with_context(|| format!("Unknown user '{}'", holder))?;
            Ok(Session::authenticated(account.id))
        }
        None => Ok(Session::anonymous()),
    }
}

fn holder_or_user<'a>(holder: Option<&'a str>, user: Option<&'a str>) -> Result<&'a str> {
    holder
        .or(user)
        .context("Specify an account holder or pass --user")
}

fn parse_deadline(deadline: Option<String>) -> Result<Option<NaiveDate>> {
    deadline
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", s))
        })
        .transpose()
}

fn parse_id(id: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

async fn run_account_command(
    service: &BankService,
    session: &Session,
    cmd: AccountCommands,
) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            holder,
            national_id,
            role,
        } => {
            let role = Role::from_str(&role).with_context(|| {
                format!(
                    "Invalid role '{}'. Valid roles: admin, moderator, user",
                    role
                )
            })?;

            let account = service.open_account(holder, national_id, role).await?;
            println!("Opened account: {} ({})", account.holder, account.role);
            println!("  Card number: {}", account.card_number);
            println!("  Balance:     {}", format_cents(account.balance_cents));
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<20} {:<12} {:<10} {:>12}", "HOLDER", "ROLE", "BLOCKED", "BALANCE");
                println!("{}", "-".repeat(58));
                for account in accounts {
                    println!(
                        "{:<20} {:<12} {:<10} {:>12}",
                        account.holder,
                        account.role,
                        if account.blocked { "yes" } else { "no" },
                        format_cents(account.balance_cents)
                    );
                }
            }
        }

        AccountCommands::Show { holder } => {
            let info = service.get_account_info(&holder).await?;
            let account = &info.account;

            println!("Account: {}", account.holder);
            println!("  ID:           {}", account.id);
            println!("  Card number:  {}", account.card_number);
            println!("  National id:  {}", account.national_id);
            println!("  Role:         {}", account.role);
            println!("  Blocked:      {}", if account.blocked { "yes" } else { "no" });
            println!(
                "  Created:      {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:      {}", format_cents(account.balance_cents));
            println!(
                "  Entries:      {} ({} in, {} out)",
                info.incoming_count + info.outgoing_count,
                info.incoming_count,
                info.outgoing_count
            );
            if let Some(last) = info.last_activity {
                println!("  Last entry:   {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        AccountCommands::Block { holder } => {
            service.set_blocked(session, &holder, true).await?;
            println!("Blocked account: {}", holder);
        }

        AccountCommands::Unblock { holder } => {
            service.set_blocked(session, &holder, false).await?;
            println!("Unblocked account: {}", holder);
        }
    }

    Ok(())
}

async fn run_transactions_command(
    service: &BankService,
    session: &Session,
    holder: &str,
) -> Result<()> {
    let entries = service.list_transactions(session, holder).await?;
    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    let names = service.account_names().await?;
    println!(
        "{:<6} {:<20} {:<14} {:<20} {:>12}",
        "SEQ", "DATE", "KIND", "COUNTERPARTY", "AMOUNT"
    );
    println!("{}", "-".repeat(76));
    for entry in entries {
        let counterparty = entry
            .counterparty_id
            .and_then(|id| names.get(&id).cloned())
            .or_else(|| entry.reference.clone())
            .unwrap_or_default();
        println!(
            "{:<6} {:<20} {:<14} {:<20} {:>12}",
            entry.sequence,
            entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.kind.to_string(),
            counterparty,
            format_cents(entry.amount_cents)
        );
    }

    Ok(())
}

async fn run_bill_command(service: &BankService, session: &Session, cmd: BillCommands) -> Result<()> {
    match cmd {
        BillCommands::Pay {
            reference,
            amount,
            idempotency_key,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let entry = service
                .pay_bill(session, &reference, amount_cents, idempotency_key)
                .await?;
            println!(
                "Paid bill {}: {} ({})",
                reference,
                format_cents(entry.amount_cents),
                entry.id
            );
        }

        BillCommands::List => {
            let bills = service.list_bills(session).await?;
            if bills.is_empty() {
                println!("No bill payments found.");
            } else {
                println!("{:<20} {:<20} {:>12}", "DATE", "REFERENCE", "AMOUNT");
                println!("{}", "-".repeat(54));
                for bill in bills {
                    println!(
                        "{:<20} {:<20} {:>12}",
                        bill.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        bill.reference.clone().unwrap_or_default(),
                        format_cents(bill.amount_cents)
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_goal_command(service: &BankService, session: &Session, cmd: GoalCommands) -> Result<()> {
    match cmd {
        GoalCommands::Create {
            title,
            target,
            deadline,
        } => {
            let target_cents =
                parse_cents(&target).context("Invalid target format. Use '1000.00'")?;
            let deadline = parse_deadline(deadline)?;
            let goal = service
                .create_goal(session, title, target_cents, deadline)
                .await?;
            println!(
                "Created goal: {} (target {}) [{}]",
                goal.title,
                format_cents(goal.target_cents),
                goal.id
            );
        }

        GoalCommands::List => {
            let goals = service.list_goals().await?;
            if goals.is_empty() {
                println!("No goals found.");
            } else {
                println!(
                    "{:<36} {:<20} {:>12} {:>12} {:<12}",
                    "ID", "TITLE", "CURRENT", "TARGET", "STATUS"
                );
                println!("{}", "-".repeat(96));
                for goal in goals {
                    println!(
                        "{:<36} {:<20} {:>12} {:>12} {:<12}",
                        goal.id,
                        goal.title,
                        format_cents(goal.current_cents),
                        format_cents(goal.target_cents),
                        goal.status.to_string()
                    );
                }
            }
        }

        GoalCommands::Fund { id, amount } => {
            let goal_id = parse_id(&id, "goal")?;
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let goal = service.fund_goal(session, goal_id, amount_cents).await?;
            println!(
                "Funded goal {}: {} of {} ({})",
                goal.title,
                format_cents(goal.current_cents),
                format_cents(goal.target_cents),
                goal.status
            );
        }
    }

    Ok(())
}

async fn run_project_command(
    service: &BankService,
    session: &Session,
    cmd: ProjectCommands,
) -> Result<()> {
    match cmd {
        ProjectCommands::Create {
            title,
            goal,
            deadline,
        } => {
            let goal_cents = parse_cents(&goal).context("Invalid goal format. Use '5000.00'")?;
            let deadline = parse_deadline(deadline)?;
            let project = service
                .create_project(session, title, goal_cents, deadline)
                .await?;
            println!(
                "Created project: {} (goal {}) [{}]",
                project.title,
                format_cents(project.goal_cents),
                project.id
            );
        }

        ProjectCommands::List => {
            let projects = service.list_projects().await?;
            if projects.is_empty() {
                println!("No projects found.");
            } else {
                println!(
                    "{:<36} {:<20} {:>12} {:>12} {:<8}",
                    "ID", "TITLE", "FUNDED", "GOAL", "STATUS"
                );
                println!("{}", "-".repeat(92));
                for project in projects {
                    println!(
                        "{:<36} {:<20} {:>12} {:>12} {:<8}",
                        project.id,
                        project.title,
                        format_cents(project.current_cents),
                        format_cents(project.goal_cents),
                        project.status.to_string()
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_invest_command(
    service: &BankService,
    session: &Session,
    cmd: InvestCommands,
) -> Result<()> {
    match cmd {
        InvestCommands::Request { project_id, amount } => {
            let project_id = parse_id(&project_id, "project")?;
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00'")?;
            let investment = service
                .request_investment(session, project_id, amount_cents)
                .await?;
            println!(
                "Requested investment of {} ({}, status {})",
                format_cents(investment.amount_cents),
                investment.id,
                investment.status
            );
        }

        InvestCommands::Accept { id } => {
            let investment_id = parse_id(&id, "investment")?;
            let project = service.accept_investment(session, investment_id).await?;
            println!(
                "Accepted investment. Project {} now at {} of {} ({})",
                project.title,
                format_cents(project.current_cents),
                format_cents(project.goal_cents),
                project.status
            );
        }

        InvestCommands::Decline { id } => {
            let investment_id = parse_id(&id, "investment")?;
            let investment = service.decline_investment(session, investment_id).await?;
            println!("Declined investment {} ({})", investment.id, investment.status);
        }

        InvestCommands::List { project_id } => {
            let project_id = parse_id(&project_id, "project")?;
            let investments = service.list_investments(project_id).await?;
            if investments.is_empty() {
                println!("No investments found.");
            } else {
                let names = service.account_names().await?;
                println!(
                    "{:<36} {:<20} {:>12} {:<10}",
                    "ID", "INVESTOR", "AMOUNT", "STATUS"
                );
                println!("{}", "-".repeat(80));
                for investment in investments {
                    let investor = names
                        .get(&investment.investor_id)
                        .cloned()
                        .unwrap_or_else(|| investment.investor_id.to_string());
                    println!(
                        "{:<36} {:<20} {:>12} {:<10}",
                        investment.id,
                        investor,
                        format_cents(investment.amount_cents),
                        investment.status.to_string()
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_check_command(service: &BankService) -> Result<()> {
    let report = service.check_audit().await?;

    println!(
        "Checked {} accounts, {} ledger entries",
        report.account_count, report.entry_count
    );
    if report.is_ok() {
        println!("Ledger OK: balances match the replayed ledger.");
    } else {
        println!("Found {} issue(s):", report.issues.len());
        for issue in &report.issues {
            println!("  - {}", issue);
        }
    }

    Ok(())
}

async fn run_export_command(
    service: &BankService,
    session: &Session,
    export_type: &str,
    holder: Option<&str>,
    output: Option<String>,
) -> Result<()> {
    let exporter = Exporter::new(service);

    let mut writer: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(std::fs::File::create(path).context("Failed to create output file")?),
        None => Box::new(std::io::stdout()),
    };

    match export_type {
        "statement" => {
            let holder = holder.context("Specify --holder or pass --user for a statement")?;
            let count = exporter
                .export_statement_csv(session, holder, &mut writer)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
        "snapshot" => {
            exporter.export_snapshot_json(&mut writer).await?;
            if output.is_some() {
                eprintln!("Exported snapshot");
            }
        }
        other => anyhow::bail!("Unknown export type '{}'. Use: statement, snapshot", other),
    }

    Ok(())
}
