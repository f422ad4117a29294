use std::io::Write;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use uuid::Uuid;

use promise_core::{Clock, OrderId, SystemClock};

use crate::entry::{AuditLogEntry, AuditRecord};

/// Audit ledger error.
///
/// A failure here never removes or alters entries that were already appended.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit ledger lock poisoned")]
    LockPoisoned,

    #[error("audit snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit export write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Append-only audit ledger.
///
/// Implementations must assign strictly increasing sequence numbers, serialize
/// concurrent appends, and return entries in insertion order.
pub trait AuditLedger: Send + Sync {
    /// Snapshot the record's input/output and append it.
    fn record(&self, record: AuditRecord<'_>) -> Result<AuditLogEntry, AuditError>;

    /// Entries for one order (or all entries), in insertion order.
    fn query(&self, order_id: Option<&OrderId>) -> Result<Vec<AuditLogEntry>, AuditError>;

    fn len(&self) -> Result<usize, AuditError>;

    fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }

    /// The full ledger as pretty-printed JSON.
    fn export(&self) -> Result<String, AuditError> {
        Ok(serde_json::to_string_pretty(&self.query(None)?)?)
    }

    /// Write the export to `writer`.
    fn export_to(&self, writer: &mut dyn Write) -> Result<(), AuditError> {
        let json = self.export()?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl<L> AuditLedger for Arc<L>
where
    L: AuditLedger + ?Sized,
{
    fn record(&self, record: AuditRecord<'_>) -> Result<AuditLogEntry, AuditError> {
        (**self).record(record)
    }

    fn query(&self, order_id: Option<&OrderId>) -> Result<Vec<AuditLogEntry>, AuditError> {
        (**self).query(order_id)
    }

    fn len(&self) -> Result<usize, AuditError> {
        (**self).len()
    }
}

/// In-memory append-only ledger.
pub struct InMemoryAuditLedger {
    entries: RwLock<Vec<AuditLogEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryAuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditLedger")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl InMemoryAuditLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            clock,
        }
    }
}

impl AuditLedger for InMemoryAuditLedger {
    fn record(&self, record: AuditRecord<'_>) -> Result<AuditLogEntry, AuditError> {
        // Snapshot outside the lock.
        let input = record.input.to_value()?;
        let output = record.output.to_value()?;

        let mut entries = self.entries.write().map_err(|_| AuditError::LockPoisoned)?;
        let sequence = entries.last().map(|e| e.sequence).unwrap_or(0) + 1;
        let entry = AuditLogEntry {
            sequence,
            entry_id: Uuid::now_v7(),
            recorded_at: self.clock.now(),
            order_id: record.order_id.cloned(),
            stage: record.stage,
            action: record.action,
            input,
            output,
            status: record.status,
            duration_ms: record.duration_ms,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, order_id: Option<&OrderId>) -> Result<Vec<AuditLogEntry>, AuditError> {
        let entries = self.entries.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(match order_id {
            Some(id) => entries
                .iter()
                .filter(|e| e.order_id.as_ref() == Some(id))
                .cloned()
                .collect(),
            None => entries.clone(),
        })
    }

    fn len(&self) -> Result<usize, AuditError> {
        Ok(self.entries.read().map_err(|_| AuditError::LockPoisoned)?.len())
    }
}
