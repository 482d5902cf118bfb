//! Rollback: the ordered record of inverse operations
//!
//! Entries are appended strictly in the order mutations were applied and are
//! replayed in that same order (first mutation's inverse first). Each replayed
//! entry is isolated: a failing inverse never prevents the next one from
//! running.

mod artifact;
mod ledger;
mod replay;

pub use artifact::{ARTIFACT_VERSION, RollbackArtifact, RollbackRecorder};
pub use ledger::{RollbackEntry, RollbackLedger};
pub use replay::{AutoRollback, ReplayFailure, ReplayReport, replay};
