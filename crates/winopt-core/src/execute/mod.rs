//! Execution: walking a plan against the host
//!
//! The [`Executor`] owns a run. It takes every mutation through
//! `Pending -> {SkippedNotFound | SkippedUserDeclined | Applying} -> {Applied | Failed}`
//! (or `Previewed` in dry-run mode), records counters and rollback entries on
//! an explicit [`ExecutionSession`], and writes one [`Journal`] line per
//! terminal transition.

mod confirm;
mod executor;
mod journal;
mod session;

pub use confirm::{AlwaysApprove, AlwaysDeny, Confirmation};
pub use executor::Executor;
pub use journal::{Journal, JournalLine, LogLevel};
pub use session::{ChangeRecord, ExecutionMode, ExecutionSession, SessionFiles, SessionSummary};
