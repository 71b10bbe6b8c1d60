mod repository;

pub use repository::*;

/// SQL migration for initial schema (accounts, ledger, sequence counter)
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for savings goals
pub const MIGRATION_002_GOALS: &str = include_str!("migrations/002_goals.sql");

/// SQL migration for projects and investments
pub const MIGRATION_003_PROJECTS: &str = include_str!("migrations/003_projects.sql");
