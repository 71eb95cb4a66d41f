//! Approval records and approver kinds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Status of a single approval level.
///
/// A level moves out of `Pending` exactly once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Awaiting the approver's decision.
    Pending,
    /// Approved by this level's approver.
    Approved,
    /// Rejected by this level's approver.
    Rejected,
    /// Closed without a decision because the request reached a terminal
    /// state first. Only written under the `supersede_pending` policy.
    Superseded,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "PENDING"),
            ApprovalStatus::Approved => write!(f, "APPROVED"),
            ApprovalStatus::Rejected => write!(f, "REJECTED"),
            ApprovalStatus::Superseded => write!(f, "SUPERSEDED"),
        }
    }
}

/// How the approver for a chain level is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverKind {
    /// The applicant's direct reporting manager.
    ReportingManager,
    /// The reporting manager's own manager.
    SkipLevelManager,
    /// The first active holder of a role, independent of the hierarchy.
    Role {
        /// The role whose holder approves.
        role: Role,
    },
}

impl ApproverKind {
    /// How many hops up the reporting hierarchy this kind needs, if any.
    pub fn hierarchy_tier(&self) -> Option<usize> {
        match self {
            ApproverKind::ReportingManager => Some(1),
            ApproverKind::SkipLevelManager => Some(2),
            ApproverKind::Role { .. } => None,
        }
    }
}

impl fmt::Display for ApproverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproverKind::ReportingManager => write!(f, "reporting manager"),
            ApproverKind::SkipLevelManager => write!(f, "skip-level manager"),
            ApproverKind::Role { role } => write!(f, "{} role holder", role),
        }
    }
}

/// The decision an approver submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    /// Approve this level.
    Approve,
    /// Reject the request.
    Reject,
}

/// One level of a request's approval chain. Unique on
/// `(leave_request_id, level)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// The request this level belongs to.
    pub leave_request_id: Uuid,
    /// 1-based position in the chain.
    pub level: u8,
    /// The resolved approver.
    pub approver_id: String,
    /// How the approver was resolved.
    pub approver_role: ApproverKind,
    /// Current status.
    pub status: ApprovalStatus,
    /// Comments left with the decision.
    #[serde(default)]
    pub comments: Option<String>,
    /// When the decision was written.
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    /// Creates a pending record.
    pub fn pending(
        leave_request_id: Uuid,
        level: u8,
        approver_id: impl Into<String>,
        approver_role: ApproverKind,
    ) -> Self {
        Self {
            leave_request_id,
            level,
            approver_id: approver_id.into(),
            approver_role,
            status: ApprovalStatus::Pending,
            comments: None,
            decided_at: None,
        }
    }

    /// Returns true if the level still awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Records a decision on a pending level.
    pub(crate) fn decide(
        &mut self,
        action: DecisionAction,
        comments: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status = match action {
            DecisionAction::Approve => ApprovalStatus::Approved,
            DecisionAction::Reject => ApprovalStatus::Rejected,
        };
        self.comments = comments;
        self.decided_at = Some(at);
    }
}
