//! Leave request submission.
//!
//! Submission is the only way a request enters the engine:
//!
//! 1. The requested day count is checked against the date range.
//! 2. The [`EligibilityValidator`] runs against the employee's current
//!    requests.
//! 3. Balance-bound leave types must have `available >= total_days`.
//! 4. The [`ApprovalChainBuilder`] resolves every approver.
//! 5. The PENDING request and its approval records are inserted.
//!
//! Steps 2 to 5 share one transaction, so two submissions racing for the
//! same once-per-year slot can not both succeed. The first approver is
//! notified and the chain audited only after commit.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::approval::{ApprovalChain, ApprovalChainBuilder};
use crate::config::ApprovalSettings;
use crate::context::EngineContext;
use crate::eligibility::EligibilityValidator;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditAction, AuditEntry, BalanceKey, EntityType, LeaveBalance, LeaveRequest, LeaveStatus,
    LeaveType,
};
use crate::notification::{notify_best_effort, NotificationEvent};
use crate::policy::PolicyRuleEngine;
use crate::store::{record_audit, with_transaction, BalanceStore, Transaction};

/// A leave application as filed by an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveApplication {
    /// The applicant.
    pub employee_id: String,
    /// The requested leave type.
    pub leave_type: LeaveType,
    /// First day of leave (inclusive).
    pub start_date: NaiveDate,
    /// Last day of leave (inclusive).
    pub end_date: NaiveDate,
    /// Days to debit; a positive multiple of 0.5.
    pub total_days: Decimal,
    /// Free-text reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// A successfully submitted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// The stored PENDING request.
    pub request: LeaveRequest,
    /// Its approval chain.
    pub chain: ApprovalChain,
    /// Eligibility warnings, omitted levels, and notification or audit
    /// failures.
    pub warnings: Vec<String>,
}

/// Submits leave requests and provisions annual grants.
pub struct LeaveService {
    policies: Arc<PolicyRuleEngine>,
    ctx: EngineContext,
    eligibility: EligibilityValidator,
    chains: ApprovalChainBuilder,
}

impl LeaveService {
    /// Creates the service.
    pub fn new(
        policies: Arc<PolicyRuleEngine>,
        ctx: EngineContext,
        settings: ApprovalSettings,
    ) -> Self {
        let eligibility = EligibilityValidator::new(policies.clone());
        let chains = ApprovalChainBuilder::new(
            policies.clone(),
            ctx.employees.clone(),
            ctx.roles.clone(),
            settings,
        );
        Self {
            policies,
            ctx,
            eligibility,
            chains,
        }
    }

    /// Submits an application, creating a PENDING request and its chain.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad day count or a failed eligibility check.
    /// - `Conflict` if a blocking leave overlaps the range.
    /// - `InsufficientBalance` if a balance-bound type can not cover the
    ///   request.
    /// - `NotFound` if the employee is unknown, or if no approver at all
    ///   could be resolved.
    /// - `HierarchyCycle` if the reporting hierarchy loops.
    pub fn submit(&self, application: LeaveApplication) -> EngineResult<Submission> {
        validate_day_count(&application)?;

        let employee = self.ctx.employees.get(&application.employee_id)?;
        let leave_request_id = Uuid::new_v4();
        let now = self.ctx.clock.now();

        let (request, chain, mut warnings) = with_transaction(self.ctx.store.as_ref(), |tx| {
            let existing = tx.requests_for_employee(&employee.id)?;
            let warnings = self
                .eligibility
                .validate(
                    &employee,
                    application.leave_type,
                    application.start_date,
                    application.end_date,
                    &existing,
                )
                .into_result()?;

            let policy =
                self.policies
                    .resolve(employee.region, application.leave_type, employee.role)?;
            if policy.entitlement.is_balance_bound() {
                let available = tx
                    .balance(&BalanceKey {
                        employee_id: employee.id.clone(),
                        leave_type: application.leave_type,
                        year: application.start_date.year(),
                    })?
                    .map_or(Decimal::ZERO, |b| b.available);
                if available < application.total_days {
                    return Err(EngineError::InsufficientBalance {
                        employee_id: employee.id.clone(),
                        leave_type: application.leave_type,
                        requested: application.total_days,
                        available,
                    });
                }
            }

            let chain = self
                .chains
                .build(leave_request_id, &employee.id, application.leave_type)?;
            if chain.is_empty() {
                return Err(EngineError::NotFound {
                    entity: "approver".to_string(),
                    id: format!(
                        "no approver could be resolved for {} leave of '{}'",
                        application.leave_type, employee.id
                    ),
                });
            }

            let request = LeaveRequest {
                id: leave_request_id,
                employee_id: employee.id.clone(),
                leave_type: application.leave_type,
                start_date: application.start_date,
                end_date: application.end_date,
                total_days: application.total_days,
                status: LeaveStatus::Pending,
                reason: application.reason.clone(),
                created_at: now,
            };
            tx.insert_leave_request(request.clone())?;
            tx.insert_approval_records(&chain.to_records())?;

            Ok((request, chain, warnings))
        })?;

        for omitted in &chain.omitted {
            warnings.push(format!(
                "approval level {} ({}) omitted: {}",
                omitted.position, omitted.approver_role, omitted.reason
            ));
        }

        if let Some(first) = chain.first() {
            notify_best_effort(
                self.ctx.notifier.as_ref(),
                &first.approver_id,
                NotificationEvent::ApprovalRequested,
                &json!({
                    "leave_request_id": request.id,
                    "employee_id": request.employee_id,
                    "leave_type": request.leave_type,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                    "total_days": request.total_days,
                    "level": first.level,
                }),
                &mut warnings,
            );
        }
        record_audit(
            self.ctx.audit.as_ref(),
            AuditEntry::new(
                &request.employee_id,
                AuditAction::ChainBuilt,
                EntityType::LeaveRequest,
                request.id.to_string(),
                now,
            )
            .with_details(json!({ "levels": chain.levels, "omitted": chain.omitted })),
            &mut warnings,
        );

        info!(
            leave_request_id = %request.id,
            employee_id = %request.employee_id,
            leave_type = %request.leave_type,
            total_days = %request.total_days,
            levels = chain.levels.len(),
            "Submitted leave request"
        );

        Ok(Submission {
            request,
            chain,
            warnings,
        })
    }

    /// Sets every flat-annual leave type's entitlement for `year` to the
    /// grant resolved for the employee's role.
    ///
    /// Rows already at the grant are left alone, so repeated calls change
    /// nothing. Carry-forward and usage are preserved. Returns the rows that
    /// changed.
    pub fn provision_annual_grants(
        &self,
        employee_id: &str,
        year: i32,
    ) -> EngineResult<Vec<LeaveBalance>> {
        let employee = self.ctx.employees.get(employee_id)?;
        if !employee.is_active() {
            return Err(EngineError::Validation {
                reasons: vec![format!(
                    "employee '{}' is {}, only ACTIVE employees receive grants",
                    employee.id, employee.status
                )],
            });
        }

        let changed = with_transaction(self.ctx.store.as_ref(), |tx| {
            let mut changed = Vec::new();
            for leave_type in self.policies.leave_types(employee.region)? {
                let policy = self
                    .policies
                    .resolve(employee.region, leave_type, employee.role)?;
                let Some(grant) = policy.entitlement.annual_grant() else {
                    continue;
                };

                let mut balance = tx.get_or_create(&employee.id, leave_type, year)?;
                if balance.total_entitlement == grant {
                    continue;
                }
                balance.total_entitlement = grant;
                balance.recompute_available();
                tx.put_balance(balance.clone())?;
                changed.push(balance);
            }
            Ok(changed)
        })?;

        let mut warnings = Vec::new();
        let now = self.ctx.clock.now();
        for balance in &changed {
            record_audit(
                self.ctx.audit.as_ref(),
                AuditEntry::new(
                    "annual_grant",
                    AuditAction::BalanceMutated,
                    EntityType::LeaveBalance,
                    format!("{}/{}/{}", balance.employee_id, balance.leave_type, balance.year),
                    now,
                )
                .with_details(json!({
                    "total_entitlement": balance.total_entitlement,
                    "available": balance.available,
                })),
                &mut warnings,
            );
        }

        info!(
            employee_id = %employee.id,
            year,
            changed = changed.len(),
            "Provisioned annual grants"
        );
        Ok(changed)
    }

    /// Reads a request.
    pub fn request(&self, leave_request_id: Uuid) -> EngineResult<LeaveRequest> {
        with_transaction(self.ctx.store.as_ref(), |tx| {
            tx.leave_request(leave_request_id)?
                .ok_or_else(|| EngineError::not_found("leave request", leave_request_id))
        })
    }

    /// Reads a balance row; absent rows read as zero.
    pub fn balance(
        &self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> EngineResult<LeaveBalance> {
        let key = BalanceKey {
            employee_id: employee_id.to_string(),
            leave_type,
            year,
        };
        let balance = with_transaction(self.ctx.store.as_ref(), |tx| tx.balance(&key))?;
        Ok(balance.unwrap_or_else(|| LeaveBalance::zeroed(employee_id, leave_type, year)))
    }
}

fn validate_day_count(application: &LeaveApplication) -> EngineResult<()> {
    let mut reasons = Vec::new();
    let days = application.total_days;

    if days <= Decimal::ZERO {
        reasons.push(format!("total days must be positive, got {}", days));
    } else if (days * Decimal::TWO).fract() != Decimal::ZERO {
        reasons.push(format!("total days must be a multiple of 0.5, got {}", days));
    }

    if application.end_date >= application.start_date {
        let span = (application.end_date - application.start_date).num_days() + 1;
        if days > Decimal::from(span) {
            reasons.push(format!(
                "total days {} exceed the {} calendar days from {} to {}",
                days, span, application.start_date, application.end_date
            ));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation { reasons })
    }
}
