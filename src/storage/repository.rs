use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, BalanceCheck, Cents, EntryKind, Goal, GoalId, GoalStatus, Investment,
    InvestmentId, InvestmentStatus, LedgerEntry, Project, ProjectCheck, ProjectId, ProjectStatus,
    Role,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_GOALS, MIGRATION_003_PROJECTS};

/// How long an operation may wait for the single write connection before the
/// caller sees a storage timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Structural statistics for the ledger audit.
#[derive(Debug, Clone)]
pub struct AuditStats {
    pub entry_count: i64,
    pub has_sequence_gaps: bool,
    pub non_positive_amounts: i64,
    pub orphan_entries: i64,
}

/// Repository for persisting and querying accounts, ledger entries, goals,
/// projects and investments.
///
/// The pool is capped at one connection: SQLite has a single writer, and
/// capping the pool means every operation owns the database for the length of
/// its transaction. Callers take a fresh transaction handle per operation;
/// no connection object is ever shared across concurrent callers.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .busy_timeout(ACQUIRE_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        for (name, sql) in [
            ("001", MIGRATION_001_INITIAL),
            ("002", MIGRATION_002_GOALS),
            ("003", MIGRATION_003_PROJECTS),
        ] {
            sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration {}", name))?;
        }
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a fresh transaction handle. Every balance-affecting operation
    /// runs inside exactly one of these; dropping it without commit rolls
    /// everything back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, holder, national_id, card_number, role, blocked, balance_cents, opening_balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.holder)
        .bind(&account.national_id)
        .bind(&account.card_number)
        .bind(account.role.as_str())
        .bind(account.blocked)
        .bind(account.balance_cents)
        .bind(account.opening_balance_cents)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Get an account by holder name.
    pub async fn get_account_by_holder(&self, holder: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE holder = ?")
            .bind(holder)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account by holder")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by ID.
    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts, ordered by holder name.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT * FROM accounts ORDER BY holder")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Flip the blocked flag on an account.
    pub async fn set_blocked(&self, id: AccountId, blocked: bool) -> Result<()> {
        sqlx::query("UPDATE accounts SET blocked = ? WHERE id = ?")
            .bind(blocked)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update blocked flag")?;
        Ok(())
    }

    /// Check whether a card number is already taken (card derivation retries
    /// on collision).
    pub async fn card_number_exists(&self, card_number: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE card_number = ?")
            .bind(card_number)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check card number")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Fetch an account inside a transaction.
    pub async fn account_by_id(
        conn: &mut SqliteConnection,
        id: AccountId,
    ) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch account in transaction")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Resolve an account by the (card number, national id) pair. Both must
    /// match; the pair acts as a shared secret, not a public directory.
    pub async fn account_by_card(
        conn: &mut SqliteConnection,
        card_number: &str,
        national_id: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE card_number = ? AND national_id = ?")
            .bind(card_number)
            .bind(national_id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to resolve account by card")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Fresh balance read inside a transaction. Never use a cached or
    /// non-transactional read as the basis for a mutation.
    pub async fn balance_of(conn: &mut SqliteConnection, id: AccountId) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT balance_cents FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to read balance")?;

        Ok(row.map(|r| r.get("balance_cents")))
    }

    /// Guarded debit: subtracts the amount only while the balance covers it.
    /// Returns false when the guard rejects the write, leaving the row
    /// untouched. This re-validates the balance at write time, so two
    /// operations can never both spend the same funds.
    pub async fn debit_balance(
        conn: &mut SqliteConnection,
        id: AccountId,
        amount_cents: Cents,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents >= ?
            "#,
        )
        .bind(amount_cents)
        .bind(id.to_string())
        .bind(amount_cents)
        .execute(&mut *conn)
        .await
        .context("Failed to debit account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Credit an account inside a transaction.
    pub async fn credit_balance(
        conn: &mut SqliteConnection,
        id: AccountId,
        amount_cents: Cents,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?")
            .bind(amount_cents)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to credit account")?;

        anyhow::ensure!(result.rows_affected() == 1, "Credit account does not exist");
        Ok(())
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let role_str: String = row.get("role");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            holder: row.get("holder"),
            national_id: row.get("national_id"),
            card_number: row.get("card_number"),
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role_str))?,
            blocked: row.get::<i64, _>("blocked") != 0,
            balance_cents: row.get("balance_cents"),
            opening_balance_cents: row.get("opening_balance_cents"),
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Ledger entry operations
    // ========================

    /// Get the next ledger sequence number inside a transaction.
    pub async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'ledger_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Insert a ledger entry inside a transaction. Assigns the next sequence
    /// number before writing.
    pub async fn insert_entry(conn: &mut SqliteConnection, entry: &mut LedgerEntry) -> Result<()> {
        entry.sequence = Self::next_sequence(&mut *conn).await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, sequence, account_id, counterparty_id, amount_cents, kind, description, reference, goal_id, idempotency_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(entry.account_id.to_string())
        .bind(entry.counterparty_id.map(|id| id.to_string()))
        .bind(entry.amount_cents)
        .bind(entry.kind.as_str())
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(entry.goal_id.map(|id| id.to_string()))
        .bind(&entry.idempotency_key)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert ledger entry")?;

        Ok(())
    }

    /// Look up a previously committed entry by idempotency key.
    pub async fn entry_by_idempotency_key(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query("SELECT * FROM ledger_entries WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to look up idempotency key")?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    /// List all ledger entries, oldest first.
    pub async fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query("SELECT * FROM ledger_entries ORDER BY sequence")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ledger entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// List entries touching an account (as debit or credit side), newest
    /// first.
    pub async fn list_entries_for_account(&self, id: AccountId) -> Result<Vec<LedgerEntry>> {
        let id_str = id.to_string();
        let rows = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE account_id = ? OR counterparty_id = ?
            ORDER BY sequence DESC
            "#,
        )
        .bind(&id_str)
        .bind(&id_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entries for account")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// List an account's bill payments, newest first.
    pub async fn list_bills_for_account(&self, id: AccountId) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE account_id = ? AND kind = 'bill'
            ORDER BY sequence DESC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list bills for account")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Count entries for an account (incoming and outgoing separately).
    pub async fn count_entries_for_account(&self, id: AccountId) -> Result<(i64, i64)> {
        let id_str = id.to_string();
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN counterparty_id = ? THEN 1 ELSE 0 END), 0) as incoming,
                COALESCE(SUM(CASE WHEN account_id = ? THEN 1 ELSE 0 END), 0) as outgoing
            FROM ledger_entries
            WHERE account_id = ? OR counterparty_id = ?
            "#,
        )
        .bind(&id_str)
        .bind(&id_str)
        .bind(&id_str)
        .bind(&id_str)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count entries")?;

        Ok((row.get("incoming"), row.get("outgoing")))
    }

    /// Get the last entry timestamp for an account.
    pub async fn last_activity(&self, id: AccountId) -> Result<Option<DateTime<Utc>>> {
        let id_str = id.to_string();
        let row = sqlx::query(
            r#"
            SELECT MAX(created_at) as last_activity
            FROM ledger_entries
            WHERE account_id = ? OR counterparty_id = ?
            "#,
        )
        .bind(&id_str)
        .bind(&id_str)
        .fetch_one(&self.pool)
        .await
        .context("Failed to get last activity")?;

        let last: Option<String> = row.get("last_activity");
        last.map(|s| Self::parse_timestamp(&s)).transpose()
    }

    fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let account_str: String = row.get("account_id");
        let counterparty_str: Option<String> = row.get("counterparty_id");
        let kind_str: String = row.get("kind");
        let goal_str: Option<String> = row.get("goal_id");
        let created_at_str: String = row.get("created_at");

        Ok(LedgerEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_str).context("Invalid account ID")?,
            counterparty_id: counterparty_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid counterparty ID")?,
            amount_cents: row.get("amount_cents"),
            kind: EntryKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid entry kind: {}", kind_str))?,
            description: row.get("description"),
            reference: row.get("reference"),
            goal_id: goal_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid goal ID")?,
            idempotency_key: row.get("idempotency_key"),
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Goal operations
    // ========================

    /// Save a new goal to the database.
    pub async fn save_goal(&self, goal: &Goal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO goals (id, owner_id, title, target_cents, current_cents, deadline, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(goal.id.to_string())
        .bind(goal.owner_id.to_string())
        .bind(&goal.title)
        .bind(goal.target_cents)
        .bind(goal.current_cents)
        .bind(goal.deadline.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(goal.status.as_str())
        .bind(goal.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save goal")?;
        Ok(())
    }

    /// Get a goal by ID.
    pub async fn get_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch goal")?;

        row.as_ref().map(Self::row_to_goal).transpose()
    }

    /// List all goals, newest first.
    pub async fn list_goals(&self) -> Result<Vec<Goal>> {
        let rows = sqlx::query("SELECT * FROM goals ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list goals")?;

        rows.iter().map(Self::row_to_goal).collect()
    }

    /// Fetch a goal inside a transaction.
    pub async fn goal_by_id(conn: &mut SqliteConnection, id: GoalId) -> Result<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch goal in transaction")?;

        row.as_ref().map(Self::row_to_goal).transpose()
    }

    /// Update a goal's tracked amount and status inside the same transaction
    /// as the funding debit.
    pub async fn update_goal_progress(
        conn: &mut SqliteConnection,
        id: GoalId,
        current_cents: Cents,
        status: GoalStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE goals SET current_cents = ?, status = ? WHERE id = ?")
            .bind(current_cents)
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to update goal progress")?;

        anyhow::ensure!(result.rows_affected() == 1, "Goal does not exist");
        Ok(())
    }

    fn row_to_goal(row: &SqliteRow) -> Result<Goal> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let deadline_str: Option<String> = row.get("deadline");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Goal {
            id: Uuid::parse_str(&id_str).context("Invalid goal ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            title: row.get("title"),
            target_cents: row.get("target_cents"),
            current_cents: row.get("current_cents"),
            deadline: deadline_str
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .context("Invalid goal deadline")?,
            status: GoalStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid goal status: {}", status_str))?,
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    // ========================
    // Project and investment operations
    // ========================

    /// Save a new project to the database.
    pub async fn save_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, owner_id, title, goal_cents, current_cents, status, deadline, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project.id.to_string())
        .bind(project.owner_id.to_string())
        .bind(&project.title)
        .bind(project.goal_cents)
        .bind(project.current_cents)
        .bind(project.status.as_str())
        .bind(project.deadline.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save project")?;
        Ok(())
    }

    /// Get a project by ID.
    pub async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch project")?;

        row.as_ref().map(Self::row_to_project).transpose()
    }

    /// List all projects, newest first.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list projects")?;

        rows.iter().map(Self::row_to_project).collect()
    }

    /// Fetch a project inside a transaction.
    pub async fn project_by_id(
        conn: &mut SqliteConnection,
        id: ProjectId,
    ) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch project in transaction")?;

        row.as_ref().map(Self::row_to_project).transpose()
    }

    /// Update a project's funding total and status inside the same
    /// transaction as the investment decision.
    pub async fn update_project_funding(
        conn: &mut SqliteConnection,
        id: ProjectId,
        current_cents: Cents,
        status: ProjectStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET current_cents = ?, status = ? WHERE id = ?")
            .bind(current_cents)
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to update project funding")?;

        anyhow::ensure!(result.rows_affected() == 1, "Project does not exist");
        Ok(())
    }

    /// Insert a new investment inside a transaction.
    pub async fn insert_investment(
        conn: &mut SqliteConnection,
        investment: &Investment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO investments (id, project_id, investor_id, amount_cents, status, created_at, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(investment.id.to_string())
        .bind(investment.project_id.to_string())
        .bind(investment.investor_id.to_string())
        .bind(investment.amount_cents)
        .bind(investment.status.as_str())
        .bind(investment.created_at.to_rfc3339())
        .bind(investment.decided_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to insert investment")?;
        Ok(())
    }

    /// Get an investment by ID.
    pub async fn get_investment(&self, id: InvestmentId) -> Result<Option<Investment>> {
        let row = sqlx::query("SELECT * FROM investments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch investment")?;

        row.as_ref().map(Self::row_to_investment).transpose()
    }

    /// Fetch an investment inside a transaction.
    pub async fn investment_by_id(
        conn: &mut SqliteConnection,
        id: InvestmentId,
    ) -> Result<Option<Investment>> {
        let row = sqlx::query("SELECT * FROM investments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch investment in transaction")?;

        row.as_ref().map(Self::row_to_investment).transpose()
    }

    /// Guarded terminal transition: only a pending investment can be decided.
    /// Returns false when the row was already terminal, leaving it untouched.
    pub async fn decide_investment(
        conn: &mut SqliteConnection,
        id: InvestmentId,
        status: InvestmentStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE investments
            SET status = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(decided_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to decide investment")?;

        Ok(result.rows_affected() == 1)
    }

    /// List investments on a project, newest first.
    pub async fn list_investments_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Investment>> {
        let rows = sqlx::query(
            "SELECT * FROM investments WHERE project_id = ? ORDER BY created_at DESC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list investments")?;

        rows.iter().map(Self::row_to_investment).collect()
    }

    fn row_to_project(row: &SqliteRow) -> Result<Project> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let status_str: String = row.get("status");
        let deadline_str: Option<String> = row.get("deadline");
        let created_at_str: String = row.get("created_at");

        Ok(Project {
            id: Uuid::parse_str(&id_str).context("Invalid project ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            title: row.get("title"),
            goal_cents: row.get("goal_cents"),
            current_cents: row.get("current_cents"),
            status: ProjectStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid project status: {}", status_str))?,
            deadline: deadline_str
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .context("Invalid project deadline")?,
            created_at: Self::parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_investment(row: &SqliteRow) -> Result<Investment> {
        let id_str: String = row.get("id");
        let project_str: String = row.get("project_id");
        let investor_str: String = row.get("investor_id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");
        let decided_at_str: Option<String> = row.get("decided_at");

        Ok(Investment {
            id: Uuid::parse_str(&id_str).context("Invalid investment ID")?,
            project_id: Uuid::parse_str(&project_str).context("Invalid project ID")?,
            investor_id: Uuid::parse_str(&investor_str).context("Invalid investor ID")?,
            amount_cents: row.get("amount_cents"),
            status: InvestmentStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid investment status: {}", status_str))?,
            created_at: Self::parse_timestamp(&created_at_str)?,
            decided_at: decided_at_str
                .map(|s| Self::parse_timestamp(&s))
                .transpose()?,
        })
    }

    // ========================
    // Audit queries
    // ========================

    /// Stored balance vs full ledger replay for every account, in one query.
    pub async fn balance_checks(&self) -> Result<Vec<BalanceCheck>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.holder,
                a.balance_cents,
                a.opening_balance_cents
                    + COALESCE((SELECT SUM(e.amount_cents) FROM ledger_entries e WHERE e.counterparty_id = a.id), 0)
                    - COALESCE((SELECT SUM(e.amount_cents) FROM ledger_entries e WHERE e.account_id = a.id), 0)
                    AS replayed_cents
            FROM accounts a
            ORDER BY a.holder
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute balance checks")?;

        Ok(rows
            .iter()
            .map(|row| BalanceCheck {
                holder: row.get("holder"),
                stored_cents: row.get("balance_cents"),
                replayed_cents: row.get("replayed_cents"),
            })
            .collect())
    }

    /// Stored project totals vs the sum of their confirmed investments.
    pub async fn project_checks(&self) -> Result<Vec<ProjectCheck>> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.title,
                p.current_cents,
                COALESCE((SELECT SUM(i.amount_cents) FROM investments i
                          WHERE i.project_id = p.id AND i.status = 'confirmed'), 0)
                    AS confirmed_cents
            FROM projects p
            ORDER BY p.title
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute project checks")?;

        Ok(rows
            .iter()
            .map(|row| ProjectCheck {
                title: row.get("title"),
                stored_cents: row.get("current_cents"),
                confirmed_cents: row.get("confirmed_cents"),
            })
            .collect())
    }

    /// Structural statistics for the audit.
    pub async fn audit_stats(&self) -> Result<AuditStats> {
        let sequence_check = sqlx::query(
            r#"
            SELECT
                MIN(sequence) as min_seq,
                MAX(sequence) as max_seq,
                COUNT(*) as count
            FROM ledger_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to check ledger sequence")?;

        let min_seq: Option<i64> = sequence_check.get("min_seq");
        let max_seq: Option<i64> = sequence_check.get("max_seq");
        let entry_count: i64 = sequence_check.get("count");

        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => (max - min + 1) != entry_count,
            _ => false,
        };

        let non_positive_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM ledger_entries WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count invalid amounts")?
                .get("count");

        let orphan_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM ledger_entries e
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.account_id)
               OR (e.counterparty_id IS NOT NULL
                   AND NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.counterparty_id))
               OR (e.goal_id IS NOT NULL
                   AND NOT EXISTS (SELECT 1 FROM goals g WHERE g.id = e.goal_id))
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count orphan entries")?
        .get("count");

        Ok(AuditStats {
            entry_count,
            has_sequence_gaps,
            non_positive_amounts,
            orphan_entries,
        })
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .context("Invalid timestamp")?
            .with_timezone(&Utc))
    }
}
