//! Audit ledger: an append-only record of every pipeline stage's input,
//! output, status and timing.
//!
//! Snapshots are converted to JSON values when recorded, so later changes to
//! the recorded objects never show up in the ledger.

pub mod entry;
pub mod ledger;

pub use entry::{AuditLogEntry, AuditRecord, AuditSnapshot, AuditStatus, Stage, StageSummary};
pub use ledger::{AuditError, AuditLedger, InMemoryAuditLedger};
