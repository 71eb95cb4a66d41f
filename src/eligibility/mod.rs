//! Eligibility gate run before any approval chain is built.
//!
//! Checks run category by category in a fixed order. The first category
//! with a failure stops the run, but every message within that category is
//! reported, so an applicant who fails both the gender and the marital
//! status predicate sees both reasons at once.
//!
//! | Order | Category | Fails when |
//! |-------|----------|------------|
//! | 1 | Date range | end date before start date |
//! | 2 | Status | employee is not ACTIVE |
//! | 3 | Region | the employee's region does not offer the leave type |
//! | 4 | Predicates | gender, marital status or service months do not match |
//! | 5 | Once per year | a PENDING/APPROVED request of the type exists that year |
//! | 6 | Blocking conflict | an active blocking leave of another type overlaps |
//!
//! Overlaps with non-blocking leave and documentation requirements are
//! reported as warnings and never make a request ineligible.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, LeaveRequest, LeaveType};
use crate::policy::{PolicyRuleEngine, ResolvedPolicy};

/// The check category that made a request ineligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityCheck {
    /// The date range is malformed.
    DateRange,
    /// The employee is not active.
    Status,
    /// The region does not offer the leave type.
    Region,
    /// Gender, marital status or service predicates failed.
    Predicates,
    /// The once-per-year limit is used up.
    OncePerYear,
    /// A blocking leave occupies part of the range.
    BlockingConflict,
}

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    /// True if the request may proceed to chain building.
    pub eligible: bool,
    /// Why the request is ineligible; empty when eligible.
    pub reasons: Vec<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
    /// The category that failed, if any.
    pub failed_check: Option<EligibilityCheck>,
}

impl EligibilityResult {
    fn eligible(warnings: Vec<String>) -> Self {
        Self {
            eligible: true,
            reasons: Vec::new(),
            warnings,
            failed_check: None,
        }
    }

    fn failed(check: EligibilityCheck, reasons: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            eligible: false,
            reasons,
            warnings,
            failed_check: Some(check),
        }
    }

    /// Converts the outcome into a result carrying the warnings.
    ///
    /// A blocking conflict becomes `Conflict`; every other failure becomes
    /// `Validation` with the collected reasons.
    pub fn into_result(self) -> EngineResult<Vec<String>> {
        match self.failed_check {
            None => Ok(self.warnings),
            Some(EligibilityCheck::BlockingConflict) => Err(EngineError::Conflict {
                message: self.reasons.join("; "),
            }),
            Some(_) => Err(EngineError::Validation {
                reasons: self.reasons,
            }),
        }
    }
}

/// Decides whether an employee may apply for a leave type over a range.
///
/// Never mutates state; `existing` is the employee's current requests as
/// read by the caller.
#[derive(Debug, Clone)]
pub struct EligibilityValidator {
    policies: Arc<PolicyRuleEngine>,
}

impl EligibilityValidator {
    /// Creates a validator over the given policies.
    pub fn new(policies: Arc<PolicyRuleEngine>) -> Self {
        Self { policies }
    }

    /// Runs every check in order.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use chrono::NaiveDate;
    /// use leave_engine::config::ConfigLoader;
    /// use leave_engine::eligibility::EligibilityValidator;
    /// use leave_engine::models::*;
    ///
    /// let (_, policies) = ConfigLoader::load("./config/leave_policy")?.into_parts();
    /// let validator = EligibilityValidator::new(Arc::new(policies));
    /// let employee = Employee {
    ///     id: "emp_001".to_string(),
    ///     region: Region::India,
    ///     role: Role::Employee,
    ///     reporting_manager_id: Some("mgr_001".to_string()),
    ///     gender: Gender::Female,
    ///     marital_status: MaritalStatus::Single,
    ///     joining_date: NaiveDate::from_ymd_opt(2022, 1, 10).unwrap(),
    ///     status: EmployeeStatus::Active,
    /// };
    /// let start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2026, 11, 29).unwrap();
    /// let result = validator.validate(&employee, LeaveType::Maternity, start, end, &[]);
    /// assert!(!result.eligible);
    /// # Ok::<(), leave_engine::error::EngineError>(())
    /// ```
    pub fn validate(
        &self,
        employee: &Employee,
        leave_type: LeaveType,
        start: NaiveDate,
        end: NaiveDate,
        existing: &[LeaveRequest],
    ) -> EligibilityResult {
        let mut warnings = Vec::new();

        if end < start {
            return EligibilityResult::failed(
                EligibilityCheck::DateRange,
                vec![format!("end date {} is before start date {}", end, start)],
                warnings,
            );
        }

        if !employee.is_active() {
            return EligibilityResult::failed(
                EligibilityCheck::Status,
                vec![format!(
                    "employee '{}' is {}, only ACTIVE employees may apply",
                    employee.id, employee.status
                )],
                warnings,
            );
        }

        let policy = match self.policies.resolve(employee.region, leave_type, employee.role) {
            Ok(policy) => policy,
            Err(_) => {
                return EligibilityResult::failed(
                    EligibilityCheck::Region,
                    vec![format!(
                        "{} leave is not offered in region {}",
                        leave_type, employee.region
                    )],
                    warnings,
                );
            }
        };

        let reasons = predicate_failures(employee, &policy, start);
        if !reasons.is_empty() {
            return EligibilityResult::failed(EligibilityCheck::Predicates, reasons, warnings);
        }

        if policy.once_per_year {
            let year = start.year();
            let taken = existing.iter().any(|r| {
                r.employee_id == employee.id
                    && r.leave_type == leave_type
                    && r.status.is_active()
                    && r.start_date.year() == year
            });
            if taken {
                return EligibilityResult::failed(
                    EligibilityCheck::OncePerYear,
                    vec![format!(
                        "only one {} request is allowed per calendar year and {} already has one",
                        leave_type, year
                    )],
                    warnings,
                );
            }
        }

        let mut conflicts = Vec::new();
        for other in existing {
            if other.employee_id != employee.id
                || !other.status.is_active()
                || !other.overlaps(start, end)
            {
                continue;
            }

            let blocking = other.leave_type != leave_type
                && self
                    .policies
                    .get_policy(employee.region, other.leave_type)
                    .is_ok_and(|rule| rule.blocking);

            let description = format!(
                "{} {} leave from {} to {}",
                other.status, other.leave_type, other.start_date, other.end_date
            );
            if blocking {
                conflicts.push(format!("conflicts with {}", description));
            } else {
                warnings.push(format!("overlaps with {}", description));
            }
        }
        if !conflicts.is_empty() {
            return EligibilityResult::failed(
                EligibilityCheck::BlockingConflict,
                conflicts,
                warnings,
            );
        }

        if let Some(documentation) = &policy.documentation {
            let calendar_days = (end - start).num_days() + 1;
            if calendar_days > i64::from(documentation.required_after_days) {
                let documents = if documentation.documents.is_empty() {
                    "supporting documents".to_string()
                } else {
                    documentation.documents.join(", ")
                };
                warnings.push(format!(
                    "{} required for {} leave longer than {} days",
                    documents, leave_type, documentation.required_after_days
                ));
            }
        }

        EligibilityResult::eligible(warnings)
    }
}

fn predicate_failures(
    employee: &Employee,
    policy: &ResolvedPolicy,
    start: NaiveDate,
) -> Vec<String> {
    let rule = &policy.eligibility;
    let mut reasons = Vec::new();

    if let Some(gender) = rule.gender {
        if employee.gender != gender {
            reasons.push(format!(
                "{} leave is restricted to {} employees",
                policy.leave_type, gender
            ));
        }
    }

    if let Some(marital_status) = rule.marital_status {
        if employee.marital_status != marital_status {
            reasons.push(format!(
                "{} leave requires marital status {}",
                policy.leave_type, marital_status
            ));
        }
    }

    let served = employee.months_of_service(start);
    if served < rule.min_service_months {
        reasons.push(format!(
            "{} leave requires {} months of service, employee has {}",
            policy.leave_type, rule.min_service_months, served
        ));
    }

    reasons
}
