//! Monthly accrual of entitlement.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;

use super::guard::{run_guarded, EmployeeOutcome, PeriodGuard};
use super::{BatchReport, PeriodJob};
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{AccrualCredit, AccrualRecord, BalanceDelta, Employee, PeriodKey};
use crate::policy::PolicyRuleEngine;
use crate::store::{BalanceStore, Transaction};

/// One month's accrual for one leave type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyAccrual {
    /// Days credited.
    pub days: Decimal,
    /// True if the joining-month half rate applied.
    pub is_pro_rated: bool,
}

/// Computes the accrual for an employee who joined on `joining_date`.
///
/// Employees who joined before the month earn the full rate. Employees who
/// joined during the month earn the full rate if they joined on or before
/// `join_day_threshold`, and half the rate otherwise. Employees who had not
/// joined by the end of the month earn nothing.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use leave_engine::batch::calculate_monthly_accrual;
/// use rust_decimal::Decimal;
///
/// let joined = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
/// let accrual = calculate_monthly_accrual(joined, 2026, 3, Decimal::new(125, 2), 15).unwrap();
/// assert_eq!(accrual.days, Decimal::new(625, 3));
/// assert!(accrual.is_pro_rated);
/// ```
pub fn calculate_monthly_accrual(
    joining_date: NaiveDate,
    year: i32,
    month: u32,
    monthly_rate: Decimal,
    join_day_threshold: u32,
) -> Option<MonthlyAccrual> {
    let joined = (joining_date.year(), joining_date.month());
    if joined > (year, month) {
        return None;
    }

    if joined == (year, month) && joining_date.day() > join_day_threshold {
        return Some(MonthlyAccrual {
            days: monthly_rate / Decimal::TWO,
            is_pro_rated: true,
        });
    }

    Some(MonthlyAccrual {
        days: monthly_rate,
        is_pro_rated: false,
    })
}

/// Credits monthly entitlement to every active employee in regions that
/// accrue monthly.
///
/// Each employee's credits and their `(employee, year, month)` accrual
/// record are written in one transaction. An existing record means the
/// month was already credited, so re-running a period never double-credits.
pub struct AccrualProcessor {
    policies: Arc<PolicyRuleEngine>,
    ctx: EngineContext,
    guard: Arc<PeriodGuard>,
}

impl AccrualProcessor {
    /// Job name used for period guarding.
    pub const JOB: &'static str = "monthly_accrual";

    /// Creates the processor.
    pub fn new(policies: Arc<PolicyRuleEngine>, ctx: EngineContext, guard: Arc<PeriodGuard>) -> Self {
        Self {
            policies,
            ctx,
            guard,
        }
    }

    /// Credits one employee for one month within `tx`.
    fn accrue(
        &self,
        employee: &Employee,
        year: i32,
        month: u32,
        tx: &mut dyn Transaction,
    ) -> EngineResult<EmployeeOutcome> {
        if tx.accrual_record(&employee.id, year, month)?.is_some() {
            return Ok(EmployeeOutcome::Skipped);
        }

        let threshold = self.policies.join_day_threshold(employee.region)?;
        let mut credits = Vec::new();

        for leave_type in self.policies.leave_types(employee.region)? {
            let policy = self
                .policies
                .resolve(employee.region, leave_type, employee.role)?;
            let Some(monthly_rate) = policy.entitlement.monthly_rate() else {
                continue;
            };
            let Some(accrual) =
                calculate_monthly_accrual(employee.joining_date, year, month, monthly_rate, threshold)
            else {
                continue;
            };

            tx.apply_delta(&employee.id, leave_type, year, BalanceDelta::credit(accrual.days))?;
            credits.push(AccrualCredit {
                leave_type,
                days: accrual.days,
                is_pro_rated: accrual.is_pro_rated,
            });
        }

        if credits.is_empty() {
            return Ok(EmployeeOutcome::Skipped);
        }

        let details = json!({ "year": year, "month": month, "credits": credits });
        tx.insert_accrual_record(AccrualRecord {
            employee_id: employee.id.clone(),
            year,
            month,
            credits,
            processed_at: self.ctx.clock.now(),
        })?;
        Ok(EmployeeOutcome::Processed(details))
    }
}

impl PeriodJob for AccrualProcessor {
    fn name(&self) -> &'static str {
        Self::JOB
    }

    fn run_period(&self, period: &PeriodKey) -> EngineResult<BatchReport> {
        let PeriodKey::Month { year, month } = *period else {
            return Err(EngineError::Validation {
                reasons: vec![format!(
                    "{} runs on monthly periods (YYYY-MM), got {}",
                    Self::JOB,
                    period
                )],
            });
        };

        let employees: Vec<Employee> = self
            .ctx
            .employees
            .employees()?
            .into_iter()
            .filter(|e| e.is_active() && self.policies.uses_monthly_accrual(e.region))
            .collect();

        run_guarded(&self.guard, &self.ctx, Self::JOB, period, employees, |employee, tx| {
            self.accrue(employee, year, month, tx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchSettings, ConfigLoader};
    use crate::context::InMemoryContext;
    use crate::models::{
        EmployeeStatus, Gender, LeaveType, MaritalStatus, Region, Role, RunStatus,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(id: &str, region: Region, joining_date: NaiveDate) -> Employee {
        Employee {
            id: id.to_string(),
            region,
            role: Role::Employee,
            reporting_manager_id: None,
            gender: Gender::Male,
            marital_status: MaritalStatus::Single,
            joining_date,
            status: EmployeeStatus::Active,
        }
    }

    fn processor(memory: &InMemoryContext) -> AccrualProcessor {
        let (_, policies) = ConfigLoader::load("./config/leave_policy")
            .unwrap()
            .into_parts();
        let ctx = memory.context();
        let guard = Arc::new(PeriodGuard::new(
            ctx.store.clone(),
            ctx.clock.clone(),
            &BatchSettings::default(),
        ));
        AccrualProcessor::new(Arc::new(policies), ctx, guard)
    }

    #[test]
    fn test_join_on_threshold_day_earns_full_rate() {
        let accrual = calculate_monthly_accrual(date(2026, 3, 15), 2026, 3, dec("1.25"), 15).unwrap();
        assert_eq!(accrual.days, dec("1.25"));
        assert!(!accrual.is_pro_rated);
    }

    #[test]
    fn test_join_after_threshold_day_earns_half_rate() {
        let accrual = calculate_monthly_accrual(date(2026, 3, 16), 2026, 3, dec("1.25"), 15).unwrap();
        assert_eq!(accrual.days, dec("0.625"));
        assert!(accrual.is_pro_rated);
    }

    #[test]
    fn test_earlier_joiner_earns_full_rate() {
        let accrual = calculate_monthly_accrual(date(2025, 11, 30), 2026, 3, dec("1"), 15).unwrap();
        assert_eq!(accrual.days, dec("1"));
        assert!(!accrual.is_pro_rated);
    }

    #[test]
    fn test_future_joiner_earns_nothing() {
        assert!(calculate_monthly_accrual(date(2026, 4, 1), 2026, 3, dec("1"), 15).is_none());
    }

    #[test]
    fn test_credits_every_accruing_type_once() {
        let memory = InMemoryContext::new(
            vec![
                employee("emp_001", Region::India, date(2024, 1, 10)),
                employee("emp_us", Region::Us, date(2024, 1, 10)),
            ],
            vec![],
            date(2026, 4, 1),
        );
        let processor = processor(&memory);
        let period = PeriodKey::month(2026, 3).unwrap();

        let report = processor.run_period(&period).unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.processed, vec!["emp_001"]);

        let pl = memory
            .store
            .balance_of("emp_001", LeaveType::Privilege, 2026)
            .unwrap();
        assert_eq!(pl.total_entitlement, dec("1.25"));
        assert_eq!(pl.available, dec("1.25"));
        assert!(pl.is_consistent());
        let sl = memory
            .store
            .balance_of("emp_001", LeaveType::Sick, 2026)
            .unwrap();
        assert_eq!(sl.available, dec("0.5"));
        assert!(memory
            .store
            .balance_of("emp_001", LeaveType::Maternity, 2026)
            .is_none());

        assert_eq!(memory.store.accrual("emp_001", 2026, 3).unwrap().credits.len(), 3);

        assert!(matches!(
            processor.run_period(&period),
            Err(EngineError::DuplicatePeriod { .. })
        ));
    }

    #[test]
    fn test_inactive_employees_are_not_credited() {
        let mut leaver = employee("emp_002", Region::India, date(2024, 1, 10));
        leaver.status = EmployeeStatus::Inactive;
        let memory = InMemoryContext::new(vec![leaver], vec![], date(2026, 4, 1));

        let report = processor(&memory)
            .run_period(&PeriodKey::month(2026, 3).unwrap())
            .unwrap();
        assert!(report.processed.is_empty());
        assert!(memory.store.balances().is_empty());
    }

    #[test]
    fn test_yearly_period_is_rejected() {
        let memory = InMemoryContext::new(vec![], vec![], date(2026, 4, 1));
        assert!(matches!(
            processor(&memory).run_period(&PeriodKey::Year(2026)),
            Err(EngineError::Validation { .. })
        ));
    }
}
