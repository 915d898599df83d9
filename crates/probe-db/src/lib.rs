//! # Probe DB
//!
//! Postgres persistence layer for the probe service: the `domain` schema
//! (requests, assignments, check results, agents) and the `messages`
//! schema (outbox/inbox staging tables).
//!
//! Repository methods take any [`sqlx::PgExecutor`] so the dispatcher and
//! the inbox can compose several writes into one transaction.
//!
//! ## Modules
//!
//! - [`pool`] - Connection pool and migrations
//! - [`models`] - Row types
//! - [`repo`] - Repositories
//! - [`error`] - Database error types

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod models;
pub mod pool;
pub mod repo;

pub use error::{DbError, Result};
pub use models::{
    AgentRow, AssignmentRow, CheckResultRow, CheckResultViewRow, InboxMessageRow, OutboxMessageRow,
    RequestRow,
};
pub use pool::{DbConfig, DbPool, MigrationConfig};
pub use repo::{AgentRepo, InboxRepo, OutboxRepo, RequestRepo};
