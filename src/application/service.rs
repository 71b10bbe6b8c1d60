use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::domain::{
    Account, AccountId, AuditReport, Cents, Decision, Goal, GoalId, Investment, InvestmentId,
    LedgerEntry, LedgerOperation, Project, ProjectId, Role, build_audit_report,
    derive_card_number,
};
use crate::storage::Repository;

use super::{AppError, Session, executor};

/// Application service providing the banking operations. This is the primary
/// interface for any client (CLI, API, UI); callers pass their identity
/// explicitly as a [`Session`] on every mutating call.
pub struct BankService {
    repo: Repository,
}

/// Result of a committed transfer, with holder names resolved for display.
pub struct TransferReceipt {
    pub entry: LedgerEntry,
    pub sender_holder: String,
    pub recipient_holder: String,
}

/// Detailed account information.
pub struct AccountInfo {
    pub account: Account,
    pub incoming_count: i64,
    pub outgoing_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl BankService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account: derives a unique Luhn-valid card number and
    /// seeds the default starting balance.
    pub async fn open_account(
        &self,
        holder: String,
        national_id: String,
        role: Role,
    ) -> Result<Account, AppError> {
        if self.repo.get_account_by_holder(&holder).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(holder));
        }

        let mut account = Account::new(holder, national_id).with_role(role);
        // Card collisions are vanishingly rare; re-derive until free.
        while self.repo.card_number_exists(&account.card_number).await? {
            account.card_number = derive_card_number();
        }

        self.repo.save_account(&account).await?;
        info!(holder = %account.holder, role = %account.role, "account opened");
        Ok(account)
    }

    /// Get an account by holder name.
    pub async fn get_account(&self, holder: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_holder(holder)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(holder.to_string()))
    }

    /// Get detailed account information.
    pub async fn get_account_info(&self, holder: &str) -> Result<AccountInfo, AppError> {
        let account = self.get_account(holder).await?;
        let (incoming_count, outgoing_count) =
            self.repo.count_entries_for_account(account.id).await?;
        let last_activity = self.repo.last_activity(account.id).await?;

        Ok(AccountInfo {
            account,
            incoming_count,
            outgoing_count,
            last_activity,
        })
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    /// Display-only balance read. Never the basis for a mutation; every
    /// operation re-reads inside its own transaction.
    pub async fn get_balance(&self, holder: &str) -> Result<Cents, AppError> {
        Ok(self.get_account(holder).await?.balance_cents)
    }

    /// Block or unblock an account. Only admins and moderators may do this.
    pub async fn set_blocked(
        &self,
        session: &Session,
        holder: &str,
        blocked: bool,
    ) -> Result<Account, AppError> {
        let actor = session.require_user()?;
        let actor_account = self
            .repo
            .get_account_by_id(actor)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(actor.to_string()))?;

        match actor_account.role {
            Role::Admin | Role::Moderator => {}
            Role::User => return Err(AppError::NotAuthorized),
        }

        let mut target = self.get_account(holder).await?;
        self.repo.set_blocked(target.id, blocked).await?;
        target.blocked = blocked;
        info!(holder = %target.holder, blocked, "blocked flag updated");
        Ok(target)
    }

    /// Get a map of account IDs to holder names (useful for display).
    pub async fn account_names(&self) -> Result<HashMap<AccountId, String>, AppError> {
        let accounts = self.repo.list_accounts().await?;
        Ok(accounts.into_iter().map(|a| (a.id, a.holder)).collect())
    }

    // ========================
    // Transfer operations
    // ========================

    /// Peer-to-peer transfer. The recipient is resolved by the
    /// (card number, national id) pair inside the same transaction that moves
    /// the money.
    pub async fn transfer(
        &self,
        session: &Session,
        card_number: &str,
        national_id: &str,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<TransferReceipt, AppError> {
        let actor = session.require_user()?;

        let mut tx = self.repo.begin().await?;
        let sender = Self::require_unblocked(&mut tx, actor).await?;

        let recipient = Repository::account_by_card(&mut tx, card_number, national_id)
            .await?
            .ok_or(AppError::RecipientNotFound)?;

        if recipient.id == sender.id {
            return Err(AppError::SelfTransfer);
        }

        let mut op = LedgerOperation::transfer(sender.id, recipient.id, amount_cents);
        if let Some(desc) = description {
            op = op.with_description(desc);
        }

        let entry = executor::execute_in(&mut tx, &op).await?;
        tx.commit().await.map_err(Self::commit_error)?;

        info!(
            from = %sender.holder,
            to = %recipient.holder,
            amount_cents,
            "transfer committed"
        );

        Ok(TransferReceipt {
            entry,
            sender_holder: sender.holder,
            recipient_holder: recipient.holder,
        })
    }

    /// List the entries touching an account, newest first. Holders may read
    /// their own statement; admins and moderators may read anyone's.
    pub async fn list_transactions(
        &self,
        session: &Session,
        holder: &str,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let actor = session.require_user()?;
        let target = self.get_account(holder).await?;

        if target.id != actor {
            let actor_account = self
                .repo
                .get_account_by_id(actor)
                .await?
                .ok_or_else(|| AppError::AccountNotFound(actor.to_string()))?;
            match actor_account.role {
                Role::Admin | Role::Moderator => {}
                Role::User => return Err(AppError::NotAuthorized),
            }
        }

        Ok(self.repo.list_entries_for_account(target.id).await?)
    }

    /// List every ledger entry (export, audit tooling).
    pub async fn list_all_entries(&self) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.repo.list_entries().await?)
    }

    // ========================
    // Goal operations
    // ========================

    /// Create a new savings goal owned by the caller.
    pub async fn create_goal(
        &self,
        session: &Session,
        title: String,
        target_cents: Cents,
        deadline: Option<NaiveDate>,
    ) -> Result<Goal, AppError> {
        let actor = session.require_user()?;
        if target_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "goal target must be positive".to_string(),
            ));
        }

        let mut goal = Goal::new(actor, title, target_cents);
        if let Some(deadline) = deadline {
            goal = goal.with_deadline(deadline);
        }
        self.repo.save_goal(&goal).await?;
        info!(goal = %goal.title, target_cents, "goal created");
        Ok(goal)
    }

    /// Fund a goal from the caller's balance. The debit, the goal progress
    /// and the achievement transition commit together or not at all.
    pub async fn fund_goal(
        &self,
        session: &Session,
        goal_id: GoalId,
        amount_cents: Cents,
    ) -> Result<Goal, AppError> {
        let actor = session.require_user()?;

        let mut tx = self.repo.begin().await?;
        Self::require_unblocked(&mut tx, actor).await?;

        let mut goal = Repository::goal_by_id(&mut tx, goal_id)
            .await?
            .ok_or_else(|| AppError::GoalNotFound(goal_id.to_string()))?;

        let op = LedgerOperation::goal_funding(actor, amount_cents, goal.id);
        executor::execute_in(&mut tx, &op).await?;

        let (current_cents, status) = goal.apply_contribution(amount_cents);
        Repository::update_goal_progress(&mut tx, goal.id, current_cents, status).await?;
        tx.commit().await.map_err(Self::commit_error)?;

        goal.current_cents = current_cents;
        goal.status = status;
        info!(goal = %goal.title, amount_cents, status = %goal.status, "goal funded");
        Ok(goal)
    }

    /// Get a goal by ID.
    pub async fn get_goal(&self, goal_id: GoalId) -> Result<Goal, AppError> {
        self.repo
            .get_goal(goal_id)
            .await?
            .ok_or_else(|| AppError::GoalNotFound(goal_id.to_string()))
    }

    /// List all goals.
    pub async fn list_goals(&self) -> Result<Vec<Goal>, AppError> {
        Ok(self.repo.list_goals().await?)
    }

    // ========================
    // Bill payment operations
    // ========================

    /// Pay a bill: a one-way debit with an append-only record. Repeated
    /// submissions with the same reference are independent debits; a repeated
    /// idempotency key returns the original entry instead of debiting again.
    pub async fn pay_bill(
        &self,
        session: &Session,
        reference: &str,
        amount_cents: Cents,
        idempotency_key: Option<String>,
    ) -> Result<LedgerEntry, AppError> {
        let actor = session.require_user()?;

        let mut tx = self.repo.begin().await?;
        Self::require_unblocked(&mut tx, actor).await?;

        if let Some(key) = &idempotency_key {
            if let Some(existing) = Repository::entry_by_idempotency_key(&mut tx, key).await? {
                info!(reference, key = %key, "bill payment replayed from idempotency key");
                return Ok(existing);
            }
        }

        let mut op = LedgerOperation::bill(actor, amount_cents, reference);
        if let Some(key) = idempotency_key {
            op = op.with_idempotency_key(key);
        }

        let entry = executor::execute_in(&mut tx, &op).await?;
        tx.commit().await.map_err(Self::commit_error)?;

        info!(reference, amount_cents, "bill paid");
        Ok(entry)
    }

    /// List the caller's bill payments, newest first.
    pub async fn list_bills(&self, session: &Session) -> Result<Vec<LedgerEntry>, AppError> {
        let actor = session.require_user()?;
        Ok(self.repo.list_bills_for_account(actor).await?)
    }

    // ========================
    // Investment workflow
    // ========================

    /// Create a new crowdfunded project owned by the caller.
    pub async fn create_project(
        &self,
        session: &Session,
        title: String,
        goal_cents: Cents,
        deadline: Option<NaiveDate>,
    ) -> Result<Project, AppError> {
        let actor = session.require_user()?;
        if goal_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "project goal must be positive".to_string(),
            ));
        }

        let mut project = Project::new(actor, title, goal_cents);
        if let Some(deadline) = deadline {
            project = project.with_deadline(deadline);
        }
        self.repo.save_project(&project).await?;
        info!(project = %project.title, goal_cents, "project created");
        Ok(project)
    }

    /// List all projects.
    pub async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        Ok(self.repo.list_projects().await?)
    }

    /// State an investment intent on somebody else's project. No money moves;
    /// the amount is a pledge awaiting the owner's decision.
    pub async fn request_investment(
        &self,
        session: &Session,
        project_id: ProjectId,
        amount_cents: Cents,
    ) -> Result<Investment, AppError> {
        let actor = session.require_user()?;
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;
        Self::require_unblocked(&mut tx, actor).await?;

        let project = Repository::project_by_id(&mut tx, project_id)
            .await?
            .ok_or_else(|| AppError::ProjectNotFound(project_id.to_string()))?;

        if project.owner_id == actor {
            return Err(AppError::SelfInvestment);
        }

        let investment = Investment::new(project.id, actor, amount_cents);
        Repository::insert_investment(&mut tx, &investment).await?;
        tx.commit().await.map_err(Self::commit_error)?;

        info!(project = %project.title, amount_cents, "investment requested");
        Ok(investment)
    }

    /// Confirm a pending investment. Owner-only; bumps the project's funding
    /// total in the same transaction. The investor's balance is untouched.
    pub async fn accept_investment(
        &self,
        session: &Session,
        investment_id: InvestmentId,
    ) -> Result<Project, AppError> {
        let (_, project) = self
            .decide_investment(session, investment_id, Decision::Confirm)
            .await?;
        Ok(project)
    }

    /// Decline a pending investment. Owner-only; no totals change.
    pub async fn decline_investment(
        &self,
        session: &Session,
        investment_id: InvestmentId,
    ) -> Result<Investment, AppError> {
        let (investment, _) = self
            .decide_investment(session, investment_id, Decision::Decline)
            .await?;
        Ok(investment)
    }

    async fn decide_investment(
        &self,
        session: &Session,
        investment_id: InvestmentId,
        decision: Decision,
    ) -> Result<(Investment, Project), AppError> {
        let actor = session.require_user()?;

        let mut tx = self.repo.begin().await?;
        Self::require_unblocked(&mut tx, actor).await?;

        let mut investment = Repository::investment_by_id(&mut tx, investment_id)
            .await?
            .ok_or_else(|| AppError::InvestmentNotFound(investment_id.to_string()))?;

        let mut project = Repository::project_by_id(&mut tx, investment.project_id)
            .await?
            .ok_or_else(|| AppError::ProjectNotFound(investment.project_id.to_string()))?;

        if project.owner_id != actor {
            return Err(AppError::NotProjectOwner);
        }

        let new_status = investment
            .status
            .decide(decision)
            .map_err(|e| AppError::InvalidStateTransition { from: e.from })?;

        let decided_at = Utc::now();
        let applied =
            Repository::decide_investment(&mut tx, investment.id, new_status, decided_at).await?;
        if !applied {
            // The row guard is the backstop: report whatever terminal state
            // the investment actually holds.
            let from = Repository::investment_by_id(&mut tx, investment.id)
                .await?
                .map(|i| i.status)
                .unwrap_or(investment.status);
            return Err(AppError::InvalidStateTransition { from });
        }

        if decision == Decision::Confirm {
            let (current_cents, status) = project.apply_confirmed(investment.amount_cents);
            Repository::update_project_funding(&mut tx, project.id, current_cents, status).await?;
            project.current_cents = current_cents;
            project.status = status;
        }

        tx.commit().await.map_err(Self::commit_error)?;

        investment.status = new_status;
        investment.decided_at = Some(decided_at);
        info!(
            project = %project.title,
            investment = %investment.id,
            status = %investment.status,
            "investment decided"
        );
        Ok((investment, project))
    }

    /// Get an investment by ID.
    pub async fn get_investment(&self, id: InvestmentId) -> Result<Investment, AppError> {
        self.repo
            .get_investment(id)
            .await?
            .ok_or_else(|| AppError::InvestmentNotFound(id.to_string()))
    }

    /// List the investments on a project, newest first.
    pub async fn list_investments(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Investment>, AppError> {
        // Surface a proper error for unknown projects instead of an empty list.
        if self.repo.get_project(project_id).await?.is_none() {
            return Err(AppError::ProjectNotFound(project_id.to_string()));
        }
        Ok(self.repo.list_investments_for_project(project_id).await?)
    }

    // ========================
    // Audit
    // ========================

    /// Cross-check stored balances and project totals against the ledger.
    pub async fn check_audit(&self) -> Result<AuditReport, AppError> {
        let balances = self.repo.balance_checks().await?;
        let projects = self.repo.project_checks().await?;
        let stats = self.repo.audit_stats().await?;

        Ok(build_audit_report(
            &balances,
            &projects,
            stats.entry_count,
            stats.has_sequence_gaps,
            stats.non_positive_amounts,
            stats.orphan_entries,
        ))
    }

    // ========================
    // Internal helpers
    // ========================

    /// Fetch the acting account inside the transaction and reject blocked
    /// actors before any mutation.
    async fn require_unblocked(
        conn: &mut SqliteConnection,
        actor: AccountId,
    ) -> Result<Account, AppError> {
        let account = Repository::account_by_id(&mut *conn, actor)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(actor.to_string()))?;
        if account.blocked {
            warn!(holder = %account.holder, "blocked account rejected");
            return Err(AppError::UserBlocked);
        }
        Ok(account)
    }

    fn commit_error(err: sqlx::Error) -> AppError {
        AppError::from(anyhow::Error::from(err).context("Failed to commit transaction"))
    }
}
