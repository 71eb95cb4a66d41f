//! Level-by-level approval decisions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ApprovalSettings, RejectionPolicy};
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ApprovalRecord, ApprovalStatus, AuditAction, AuditEntry, BalanceDelta, DecisionAction,
    EntityType, LeaveBalance, LeaveRequest, LeaveStatus,
};
use crate::notification::{notify_best_effort, NotificationEvent};
use crate::policy::PolicyRuleEngine;
use crate::store::{record_audit, with_transaction, BalanceStore, Transaction};

/// The level that decides next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextApproval {
    /// The pending level.
    pub level: u8,
    /// Who decides it.
    pub approver_id: String,
}

/// Result of a processed decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    /// The request decided on.
    pub leave_request_id: Uuid,
    /// The level the decision was recorded at.
    pub decided_level: u8,
    /// The decision.
    pub action: DecisionAction,
    /// True once the request reached a terminal status.
    pub completed: bool,
    /// The request status after the decision.
    pub status: LeaveStatus,
    /// The next level to decide, while the request is still pending.
    pub next_level: Option<NextApproval>,
    /// The debited balance row, on final approval of a balance-bound type.
    pub balance: Option<LeaveBalance>,
    /// Levels marked SUPERSEDED by a rejection.
    pub superseded_levels: Vec<u8>,
    /// Notification and audit failures.
    pub warnings: Vec<String>,
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    /// The cancelled request.
    pub request: LeaveRequest,
    /// Levels marked SUPERSEDED by the cancellation.
    pub superseded_levels: Vec<u8>,
    /// Notification and audit failures.
    pub warnings: Vec<String>,
}

struct Decided {
    request: LeaveRequest,
    level: u8,
    next: Option<ApprovalRecord>,
    balance: Option<LeaveBalance>,
    superseded: Vec<u8>,
}

struct Cancelled {
    request: LeaveRequest,
    pending_approvers: Vec<String>,
    superseded: Vec<u8>,
}

/// Persists and advances approval decisions.
///
/// The only component that moves a leave request out of PENDING. Reading
/// the approver's pending record, writing the decision, checking the
/// remaining levels and debiting the balance all happen in one store
/// transaction, so two concurrent final approvals can not both observe an
/// empty set of pending levels. Transient store failures are retried up to
/// `max_store_attempts`; every other error is returned as is.
///
/// Notifications and audit entries are sent after commit and never undo a
/// decision; their failures are reported in the outcome's warnings.
pub struct ApprovalStateMachine {
    policies: Arc<PolicyRuleEngine>,
    ctx: EngineContext,
    settings: ApprovalSettings,
}

impl ApprovalStateMachine {
    /// Creates a state machine.
    pub fn new(
        policies: Arc<PolicyRuleEngine>,
        ctx: EngineContext,
        settings: ApprovalSettings,
    ) -> Self {
        Self {
            policies,
            ctx,
            settings,
        }
    }

    /// Records `approver_id`'s decision on a request.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request does not exist.
    /// - `AlreadyProcessed` if the request is no longer PENDING or the
    ///   approver has no PENDING level on it.
    /// - `ApprovalOutOfTurn` if a lower level is still PENDING.
    /// - `InsufficientBalance` if the final approval can not be covered; the
    ///   decision is not recorded.
    /// - `Store` if the store keeps failing after every retry.
    pub fn process_decision(
        &self,
        leave_request_id: Uuid,
        approver_id: &str,
        action: DecisionAction,
        comments: Option<String>,
    ) -> EngineResult<DecisionOutcome> {
        let decided = self.with_retries(leave_request_id, |tx| {
            self.decide(tx, leave_request_id, approver_id, action, comments.clone())
        })?;

        let mut warnings = Vec::new();
        let request = &decided.request;
        let payload = request_payload(request);

        match (&decided.next, request.status) {
            (Some(next), _) => notify_best_effort(
                self.ctx.notifier.as_ref(),
                &next.approver_id,
                NotificationEvent::ApprovalRequested,
                &json!({ "request": payload, "level": next.level }),
                &mut warnings,
            ),
            (None, LeaveStatus::Approved) => notify_best_effort(
                self.ctx.notifier.as_ref(),
                &request.employee_id,
                NotificationEvent::RequestApproved,
                &payload,
                &mut warnings,
            ),
            (None, LeaveStatus::Rejected) => notify_best_effort(
                self.ctx.notifier.as_ref(),
                &request.employee_id,
                NotificationEvent::RequestRejected,
                &json!({ "request": payload, "level": decided.level, "comments": comments }),
                &mut warnings,
            ),
            _ => {}
        }

        let now = self.ctx.clock.now();
        record_audit(
            self.ctx.audit.as_ref(),
            AuditEntry::new(
                approver_id,
                AuditAction::DecisionProcessed,
                EntityType::LeaveRequest,
                leave_request_id.to_string(),
                now,
            )
            .with_details(json!({
                "level": decided.level,
                "action": action,
                "status": request.status,
                "comments": comments,
                "superseded_levels": decided.superseded,
            })),
            &mut warnings,
        );
        if let Some(balance) = &decided.balance {
            record_audit(
                self.ctx.audit.as_ref(),
                AuditEntry::new(
                    approver_id,
                    AuditAction::BalanceMutated,
                    EntityType::LeaveBalance,
                    format!("{}/{}/{}", balance.employee_id, balance.leave_type, balance.year),
                    now,
                )
                .with_details(json!({
                    "leave_request_id": leave_request_id,
                    "used_delta": request.total_days,
                    "available": balance.available,
                })),
                &mut warnings,
            );
        }

        info!(
            leave_request_id = %leave_request_id,
            approver_id = %approver_id,
            level = decided.level,
            action = ?action,
            status = %request.status,
            "Processed approval decision"
        );

        Ok(DecisionOutcome {
            leave_request_id,
            decided_level: decided.level,
            action,
            completed: request.status.is_terminal(),
            status: request.status,
            next_level: decided.next.map(|next| NextApproval {
                level: next.level,
                approver_id: next.approver_id,
            }),
            balance: decided.balance,
            superseded_levels: decided.superseded,
            warnings,
        })
    }

    /// Cancels a DRAFT or PENDING request on behalf of `actor_id`.
    ///
    /// Pending levels follow the configured [`RejectionPolicy`]. Approvers
    /// still waiting on the request are told it was cancelled.
    pub fn cancel(&self, leave_request_id: Uuid, actor_id: &str) -> EngineResult<CancelOutcome> {
        let cancelled = self.with_retries(leave_request_id, |tx| {
            let mut request = load_request(tx, leave_request_id)?;
            request.transition_to(LeaveStatus::Cancelled)?;
            tx.update_leave_request(request.clone())?;

            let now = self.ctx.clock.now();
            let pending: Vec<ApprovalRecord> = tx
                .approval_records(leave_request_id)?
                .into_iter()
                .filter(ApprovalRecord::is_pending)
                .collect();
            let pending_approvers = pending.iter().map(|r| r.approver_id.clone()).collect();
            let superseded = self.supersede(tx, pending, now)?;

            Ok(Cancelled {
                request,
                pending_approvers,
                superseded,
            })
        })?;

        let mut warnings = Vec::new();
        let payload = request_payload(&cancelled.request);
        for approver_id in &cancelled.pending_approvers {
            notify_best_effort(
                self.ctx.notifier.as_ref(),
                approver_id,
                NotificationEvent::RequestCancelled,
                &payload,
                &mut warnings,
            );
        }
        record_audit(
            self.ctx.audit.as_ref(),
            AuditEntry::new(
                actor_id,
                AuditAction::RequestCancelled,
                EntityType::LeaveRequest,
                leave_request_id.to_string(),
                self.ctx.clock.now(),
            )
            .with_details(json!({ "superseded_levels": cancelled.superseded })),
            &mut warnings,
        );

        info!(
            leave_request_id = %leave_request_id,
            actor_id = %actor_id,
            "Cancelled leave request"
        );

        Ok(CancelOutcome {
            request: cancelled.request,
            superseded_levels: cancelled.superseded,
            warnings,
        })
    }

    fn decide(
        &self,
        tx: &mut dyn Transaction,
        leave_request_id: Uuid,
        approver_id: &str,
        action: DecisionAction,
        comments: Option<String>,
    ) -> EngineResult<Decided> {
        let mut request = load_request(tx, leave_request_id)?;
        let records = tx.approval_records(leave_request_id)?;

        let already_processed = || EngineError::AlreadyProcessed {
            leave_request_id,
            approver_id: approver_id.to_string(),
        };
        if request.status != LeaveStatus::Pending {
            return Err(already_processed());
        }

        let mut record = records
            .iter()
            .find(|r| r.approver_id == approver_id && r.is_pending())
            .cloned()
            .ok_or_else(already_processed)?;

        let current_level = records
            .iter()
            .filter(|r| r.is_pending())
            .map(|r| r.level)
            .min()
            .unwrap_or(record.level);
        if record.level != current_level {
            return Err(EngineError::ApprovalOutOfTurn {
                leave_request_id,
                approver_id: approver_id.to_string(),
                level: record.level,
                current_level,
            });
        }

        let now = self.ctx.clock.now();
        record.decide(action, comments, now);
        tx.update_approval_record(record.clone())?;

        let remaining: Vec<ApprovalRecord> = records
            .into_iter()
            .filter(|r| r.is_pending() && r.level != record.level)
            .collect();

        if action == DecisionAction::Reject {
            request.transition_to(LeaveStatus::Rejected)?;
            tx.update_leave_request(request.clone())?;
            let superseded = self.supersede(tx, remaining, now)?;
            return Ok(Decided {
                request,
                level: record.level,
                next: None,
                balance: None,
                superseded,
            });
        }

        if let Some(next) = remaining.into_iter().next() {
            return Ok(Decided {
                request,
                level: record.level,
                next: Some(next),
                balance: None,
                superseded: Vec::new(),
            });
        }

        request.transition_to(LeaveStatus::Approved)?;
        tx.update_leave_request(request.clone())?;

        let employee = self.ctx.employees.get(&request.employee_id)?;
        let policy = self
            .policies
            .resolve(employee.region, request.leave_type, employee.role)?;

        let balance = if policy.entitlement.is_balance_bound() {
            let year = request.balance_year();
            let current = tx.get_or_create(&request.employee_id, request.leave_type, year)?;
            if current.available < request.total_days {
                return Err(EngineError::InsufficientBalance {
                    employee_id: request.employee_id.clone(),
                    leave_type: request.leave_type,
                    requested: request.total_days,
                    available: current.available,
                });
            }
            Some(tx.apply_delta(
                &request.employee_id,
                request.leave_type,
                year,
                BalanceDelta::debit(request.total_days),
            )?)
        } else {
            None
        };

        Ok(Decided {
            request,
            level: record.level,
            next: None,
            balance,
            superseded: Vec::new(),
        })
    }

    /// Applies the rejection policy to still-pending levels.
    fn supersede(
        &self,
        tx: &mut dyn Transaction,
        pending: Vec<ApprovalRecord>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<u8>> {
        if self.settings.on_rejection == RejectionPolicy::RetainPending {
            return Ok(Vec::new());
        }

        let mut superseded = Vec::with_capacity(pending.len());
        for mut record in pending {
            record.status = ApprovalStatus::Superseded;
            record.decided_at = Some(now);
            superseded.push(record.level);
            tx.update_approval_record(record)?;
        }
        Ok(superseded)
    }

    fn with_retries<T>(
        &self,
        leave_request_id: Uuid,
        mut work: impl FnMut(&mut dyn Transaction) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut attempt = 1;
        loop {
            match with_transaction(self.ctx.store.as_ref(), &mut work) {
                Err(e) if e.is_retryable() && attempt < self.settings.max_store_attempts => {
                    warn!(
                        leave_request_id = %leave_request_id,
                        attempt,
                        error = %e,
                        "Retrying after transient store failure"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn load_request(tx: &dyn Transaction, leave_request_id: Uuid) -> EngineResult<LeaveRequest> {
    tx.leave_request(leave_request_id)?
        .ok_or_else(|| EngineError::not_found("leave request", leave_request_id))
}

fn request_payload(request: &LeaveRequest) -> serde_json::Value {
    json!({
        "leave_request_id": request.id,
        "employee_id": request.employee_id,
        "leave_type": request.leave_type,
        "start_date": request.start_date,
        "end_date": request.end_date,
        "total_days": request.total_days,
        "status": request.status,
    })
}
