//! Audit sink interface and an in-memory log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::error::SinkError;
use crate::models::AuditEntry;

/// Receives an entry after every state-changing operation.
pub trait AuditSink: Send + Sync {
    /// Records one entry.
    fn record(&self, entry: AuditEntry) -> Result<(), SinkError>;
}

/// Records an entry, downgrading a sink failure to a warning.
///
/// The primary operation has already committed by the time this runs, so
/// the failure is logged and appended to `warnings` instead of returned.
pub fn record_audit(sink: &dyn AuditSink, entry: AuditEntry, warnings: &mut Vec<String>) {
    let action = entry.action;
    let entity_id = entry.entity_id.clone();

    if let Err(e) = sink.record(entry) {
        warn!(
            action = ?action,
            entity_id = %entity_id,
            error = %e,
            "Audit entry was not recorded"
        );
        warnings.push(format!("audit entry for {} was not recorded: {}", entity_id, e));
    }
}

/// An audit sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    failing: AtomicBool,
}

impl InMemoryAuditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry recorded so far, in order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes subsequent `record` calls fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::new("audit", "audit log unavailable"));
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}
