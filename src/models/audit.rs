//! Audit entries emitted after every state-changing operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An approval chain was built and persisted.
    ChainBuilt,
    /// An approver decision was recorded.
    DecisionProcessed,
    /// A request was cancelled.
    RequestCancelled,
    /// A balance row was changed.
    BalanceMutated,
    /// A batch period finished.
    PeriodCompleted,
    /// A comp-off work log was submitted.
    WorkLogSubmitted,
    /// A comp-off work log was verified or rejected.
    WorkLogDecided,
}

/// The kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A leave request.
    LeaveRequest,
    /// A leave balance row.
    LeaveBalance,
    /// A comp-off work log.
    WorkLog,
    /// A batch job period.
    BatchPeriod,
}

/// A single audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Who performed the action (an employee id or a job name).
    pub actor: String,
    /// What happened.
    pub action: AuditAction,
    /// The kind of entity affected.
    pub entity_type: EntityType,
    /// The affected entity's identifier.
    pub entity_id: String,
    /// Structured details.
    pub details: serde_json::Value,
    /// When the entry was produced.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry with empty details.
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            details: serde_json::Value::Null,
            recorded_at,
        }
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
