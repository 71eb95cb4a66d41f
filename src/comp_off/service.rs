//! Comp-off work-log submission and manager verification.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::CompOffConverter;
use crate::batch::CarryForwardProcessor;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditAction, AuditEntry, BalanceDelta, CompOffWorkLog, DecisionAction, EntityType,
    LeaveBalance, LeaveType, PeriodKey, RunStatus, WorkLogStatus,
};
use crate::notification::{notify_best_effort, NotificationEvent};
use crate::policy::PolicyRuleEngine;
use crate::store::{record_audit, with_transaction, BalanceStore, Transaction};

/// Result of submitting a work log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkLogSubmission {
    /// The stored PENDING log.
    pub log: CompOffWorkLog,
    /// The manager asked to verify it, if the employee has one.
    pub verifier_id: Option<String>,
    /// Notification and audit failures.
    pub warnings: Vec<String>,
}

/// Result of verifying or rejecting a work log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkLogDecision {
    /// The decided log.
    pub log: CompOffWorkLog,
    /// The credited COMP_OFF balance row, when days were posted.
    pub balance: Option<LeaveBalance>,
    /// Notification and audit failures.
    pub warnings: Vec<String>,
}

/// Records comp-off work and posts verified credit to the COMP_OFF balance.
///
/// A log is PENDING until the employee's direct reporting manager decides
/// it. Only verification posts days; the credit lands in the balance year
/// of the work date.
pub struct CompOffService {
    policies: Arc<PolicyRuleEngine>,
    converter: Arc<CompOffConverter>,
    ctx: EngineContext,
}

impl CompOffService {
    /// Creates the service.
    pub fn new(
        policies: Arc<PolicyRuleEngine>,
        converter: Arc<CompOffConverter>,
        ctx: EngineContext,
    ) -> Self {
        Self {
            policies,
            converter,
            ctx,
        }
    }

    /// Submits a work log for verification.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the employee is unknown.
    /// - `Validation` if the employee is inactive or the work does not earn
    ///   comp-off.
    /// - `PolicyNotFound` if the employee's region has no COMP_OFF leave.
    /// - `Conflict` if a PENDING or VERIFIED log already covers the date.
    pub fn submit_work_log(
        &self,
        employee_id: &str,
        work_date: NaiveDate,
        hours_worked: Decimal,
    ) -> EngineResult<WorkLogSubmission> {
        let employee = self.ctx.employees.get(employee_id)?;
        if !employee.is_active() {
            return Err(EngineError::Validation {
                reasons: vec![format!(
                    "employee '{}' is {}, only ACTIVE employees may log comp-off work",
                    employee.id, employee.status
                )],
            });
        }
        self.policies.get_policy(employee.region, LeaveType::CompOff)?;

        let validation = self
            .converter
            .validate(work_date, hours_worked, employee.region);
        if !validation.eligible {
            return Err(EngineError::Validation {
                reasons: validation.errors,
            });
        }

        let now = self.ctx.clock.now();
        let log = CompOffWorkLog {
            id: Uuid::new_v4(),
            employee_id: employee.id.clone(),
            work_date,
            hours_worked,
            work_type: validation.work_type,
            comp_off_earned: validation.comp_off_hours,
            verified: false,
            status: WorkLogStatus::Pending,
            verified_by: None,
            verified_at: None,
            credited_days: Decimal::ZERO,
            remainder_hours: Decimal::ZERO,
            comments: None,
            submitted_at: now,
        };

        with_transaction(self.ctx.store.as_ref(), |tx| {
            let duplicate = tx
                .work_logs_for_employee(&employee.id)?
                .into_iter()
                .find(|l| l.work_date == work_date && l.status != WorkLogStatus::Rejected);
            if let Some(existing) = duplicate {
                return Err(EngineError::Conflict {
                    message: format!(
                        "a {} work log for {} already exists ({})",
                        existing.status, work_date, existing.id
                    ),
                });
            }
            tx.insert_work_log(log.clone())
        })?;

        let mut warnings = Vec::new();
        let payload = log_payload(&log);
        if let Some(manager_id) = &employee.reporting_manager_id {
            notify_best_effort(
                self.ctx.notifier.as_ref(),
                manager_id,
                NotificationEvent::WorkLogSubmitted,
                &payload,
                &mut warnings,
            );
        }
        record_audit(
            self.ctx.audit.as_ref(),
            AuditEntry::new(
                &employee.id,
                AuditAction::WorkLogSubmitted,
                EntityType::WorkLog,
                log.id.to_string(),
                now,
            )
            .with_details(payload),
            &mut warnings,
        );

        info!(
            work_log_id = %log.id,
            employee_id = %employee.id,
            work_date = %work_date,
            work_type = ?log.work_type,
            "Submitted comp-off work log"
        );

        Ok(WorkLogSubmission {
            log,
            verifier_id: employee.reporting_manager_id,
            warnings,
        })
    }

    /// Verifies (`Approve`) or rejects (`Reject`) a PENDING work log.
    ///
    /// Verification converts the earned hours with the configured day
    /// lengths and credits the resulting days to COMP_OFF in the same
    /// transaction that closes the log. Days go to the work date's year,
    /// or to the following year once the work year has been carried
    /// forward.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the log or its employee is unknown.
    /// - `PolicyViolation` if `verifier_id` is not the employee's direct
    ///   reporting manager.
    /// - `Conflict` if the log was already decided.
    pub fn verify_work_log(
        &self,
        work_log_id: Uuid,
        verifier_id: &str,
        action: DecisionAction,
        comments: Option<String>,
    ) -> EngineResult<WorkLogDecision> {
        let now = self.ctx.clock.now();

        let (log, balance) = with_transaction(self.ctx.store.as_ref(), |tx| {
            let mut log = tx
                .work_log(work_log_id)?
                .ok_or_else(|| EngineError::not_found("work log", work_log_id))?;
            if log.status != WorkLogStatus::Pending {
                return Err(EngineError::Conflict {
                    message: format!("work log {} is already {}", work_log_id, log.status),
                });
            }

            let employee = self.ctx.employees.get(&log.employee_id)?;
            if employee.reporting_manager_id.as_deref() != Some(verifier_id) {
                return Err(EngineError::PolicyViolation {
                    message: format!(
                        "only the direct reporting manager of '{}' may verify their work logs",
                        employee.id
                    ),
                });
            }

            log.verified_by = Some(verifier_id.to_string());
            log.verified_at = Some(now);
            log.comments = comments.clone();

            let balance = match action {
                DecisionAction::Approve => {
                    let days = self.converter.calculate_days(log.comp_off_earned);
                    log.status = WorkLogStatus::Verified;
                    log.verified = true;
                    log.credited_days = days.total_days;
                    log.remainder_hours = days.remaining_hours;

                    if days.total_days > Decimal::ZERO {
                        let year = credit_year(tx, &log.employee_id, log.work_date.year())?;
                        Some(tx.apply_delta(
                            &log.employee_id,
                            LeaveType::CompOff,
                            year,
                            BalanceDelta::credit(days.total_days),
                        )?)
                    } else {
                        None
                    }
                }
                DecisionAction::Reject => {
                    log.status = WorkLogStatus::Rejected;
                    None
                }
            };

            tx.update_work_log(log.clone())?;
            Ok((log, balance))
        })?;

        let mut warnings = Vec::new();
        let payload = log_payload(&log);
        let event = match log.status {
            WorkLogStatus::Verified => NotificationEvent::WorkLogVerified,
            _ => NotificationEvent::WorkLogRejected,
        };
        notify_best_effort(
            self.ctx.notifier.as_ref(),
            &log.employee_id,
            event,
            &payload,
            &mut warnings,
        );
        record_audit(
            self.ctx.audit.as_ref(),
            AuditEntry::new(
                verifier_id,
                AuditAction::WorkLogDecided,
                EntityType::WorkLog,
                work_log_id.to_string(),
                now,
            )
            .with_details(payload),
            &mut warnings,
        );
        if let Some(balance) = &balance {
            record_audit(
                self.ctx.audit.as_ref(),
                AuditEntry::new(
                    verifier_id,
                    AuditAction::BalanceMutated,
                    EntityType::LeaveBalance,
                    format!("{}/{}/{}", balance.employee_id, balance.leave_type, balance.year),
                    now,
                )
                .with_details(json!({
                    "work_log_id": work_log_id,
                    "credited_days": log.credited_days,
                    "available": balance.available,
                })),
                &mut warnings,
            );
        }

        info!(
            work_log_id = %work_log_id,
            verifier_id = %verifier_id,
            status = %log.status,
            credited_days = %log.credited_days,
            "Decided comp-off work log"
        );

        Ok(WorkLogDecision {
            log,
            balance,
            warnings,
        })
    }

    /// Work logs of an employee, ordered by work date.
    pub fn work_logs(&self, employee_id: &str) -> EngineResult<Vec<CompOffWorkLog>> {
        with_transaction(self.ctx.store.as_ref(), |tx| {
            tx.work_logs_for_employee(employee_id)
        })
    }

    /// Days the employee's PENDING logs would credit if verified today.
    pub fn pending_credit(&self, employee_id: &str) -> EngineResult<Decimal> {
        Ok(self
            .work_logs(employee_id)?
            .iter()
            .filter(|log| log.status == WorkLogStatus::Pending)
            .map(|log| self.converter.calculate_days(log.comp_off_earned).total_days)
            .sum())
    }
}

/// The balance year a verified log is credited to.
fn credit_year(tx: &dyn Transaction, employee_id: &str, work_year: i32) -> EngineResult<i32> {
    let rolled_over = tx.carry_forward_record(employee_id, work_year)?.is_some()
        || tx
            .period_run(CarryForwardProcessor::JOB, &PeriodKey::Year(work_year))?
            .is_some_and(|run| run.status == RunStatus::Completed);
    Ok(if rolled_over { work_year + 1 } else { work_year })
}

fn log_payload(log: &CompOffWorkLog) -> serde_json::Value {
    json!({
        "work_log_id": log.id,
        "employee_id": log.employee_id,
        "work_date": log.work_date,
        "hours_worked": log.hours_worked,
        "work_type": log.work_type,
        "comp_off_earned": log.comp_off_earned,
        "status": log.status,
    })
}
