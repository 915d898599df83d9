//! Repository layer for database operations
//!
//! Methods that participate in a caller's transaction take an explicit
//! [`sqlx::PgExecutor`]; convenience wrappers run on the repo's own pool.

mod agent;
mod inbox;
mod outbox;
mod request;

pub use agent::AgentRepo;
pub use inbox::InboxRepo;
pub use outbox::OutboxRepo;
pub use request::RequestRepo;
