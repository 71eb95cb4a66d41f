//! Annual carry-forward of unused balance.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::debug;

use super::guard::{run_guarded, EmployeeOutcome, PeriodGuard};
use super::{BatchReport, PeriodJob};
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{BalanceKey, CarryForwardEntry, CarryForwardRecord, Employee, PeriodKey};
use crate::policy::PolicyRuleEngine;
use crate::store::{BalanceStore, Transaction};

/// Rolls each employee's balances out of a closing year into the next.
///
/// For every leave type of the employee's region:
///
/// - `carried = min(max(previous available, 0), cap)`, with the cap
///   resolved for the employee's role
/// - the new year's `carry_forward` becomes `carried`
/// - the new year's `total_entitlement` becomes the flat annual grant for
///   annual-grant types; other types keep whatever the new year already
///   holds (zero unless accrual already ran)
///
/// Only ACTIVE employees are rolled over; an inactive employee's closing
/// balance is neither carried nor expired.
///
/// The closing year's rows are left untouched. All leave types of one
/// employee are rolled over in a single transaction together with the
/// `(employee, from_year)` record that marks them done.
pub struct CarryForwardProcessor {
    policies: Arc<PolicyRuleEngine>,
    ctx: EngineContext,
    guard: Arc<PeriodGuard>,
}

impl CarryForwardProcessor {
    /// Job name used for period guarding.
    pub const JOB: &'static str = "annual_carry_forward";

    /// Creates the processor.
    pub fn new(policies: Arc<PolicyRuleEngine>, ctx: EngineContext, guard: Arc<PeriodGuard>) -> Self {
        Self {
            policies,
            ctx,
            guard,
        }
    }

    fn roll_over(
        &self,
        employee: &Employee,
        from_year: i32,
        tx: &mut dyn Transaction,
    ) -> EngineResult<EmployeeOutcome> {
        if tx.carry_forward_record(&employee.id, from_year)?.is_some() {
            return Ok(EmployeeOutcome::Skipped);
        }

        let to_year = from_year + 1;
        let mut entries = Vec::new();

        for leave_type in self.policies.leave_types(employee.region)? {
            let policy = self
                .policies
                .resolve(employee.region, leave_type, employee.role)?;
            let previous = tx.balance(&BalanceKey {
                employee_id: employee.id.clone(),
                leave_type,
                year: from_year,
            })?;
            let grant = policy.entitlement.annual_grant();

            if previous.is_none() && grant.is_none() {
                continue;
            }

            let previous_available = previous.map_or(Decimal::ZERO, |b| b.available);
            let carried = policy.carry_forward.carry(previous_available);
            let expired = previous_available.max(Decimal::ZERO) - carried;

            let mut next = tx.get_or_create(&employee.id, leave_type, to_year)?;
            next.carry_forward = carried;
            if let Some(days) = grant {
                next.total_entitlement = days;
            }
            next.recompute_available();
            tx.put_balance(next)?;

            debug!(
                employee_id = %employee.id,
                leave_type = %leave_type,
                from_year,
                previous_available = %previous_available,
                carried = %carried,
                expired = %expired,
                "Rolled over leave balance"
            );

            entries.push(CarryForwardEntry {
                leave_type,
                previous_available,
                cap: policy.carry_forward.cap(),
                carried,
                expired,
            });
        }

        if entries.is_empty() {
            return Ok(EmployeeOutcome::Skipped);
        }

        let details = json!({ "from_year": from_year, "to_year": to_year, "entries": entries });
        tx.insert_carry_forward_record(CarryForwardRecord {
            employee_id: employee.id.clone(),
            from_year,
            entries,
            processed_at: self.ctx.clock.now(),
        })?;
        Ok(EmployeeOutcome::Processed(details))
    }
}

impl PeriodJob for CarryForwardProcessor {
    fn name(&self) -> &'static str {
        Self::JOB
    }

    /// Runs for the closing year; `PeriodKey::Year(2025)` rolls 2025 into
    /// 2026.
    fn run_period(&self, period: &PeriodKey) -> EngineResult<BatchReport> {
        let PeriodKey::Year(from_year) = *period else {
            return Err(EngineError::Validation {
                reasons: vec![format!(
                    "{} runs on yearly periods (YYYY), got {}",
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
            .filter(|e| e.is_active() && self.policies.region(e.region).is_ok())
            .collect();

        run_guarded(&self.guard, &self.ctx, Self::JOB, period, employees, |employee, tx| {
            self.roll_over(employee, from_year, tx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchSettings, ConfigLoader};
    use crate::context::InMemoryContext;
    use crate::models::{
        BalanceDelta, EmployeeStatus, Gender, LeaveType, MaritalStatus, Region, Role, RunStatus,
    };
    use crate::store::with_transaction;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn employee(id: &str, region: Region, role: Role) -> Employee {
        Employee {
            id: id.to_string(),
            region,
            role,
            reporting_manager_id: None,
            gender: Gender::Female,
            marital_status: MaritalStatus::Married,
            joining_date: NaiveDate::from_ymd_opt(2020, 5, 4).unwrap(),
            status: EmployeeStatus::Active,
        }
    }

    fn processor(memory: &InMemoryContext) -> CarryForwardProcessor {
        let (_, policies) = ConfigLoader::load("./config/leave_policy")
            .unwrap()
            .into_parts();
        let ctx = memory.context();
        let guard = Arc::new(PeriodGuard::new(
            ctx.store.clone(),
            ctx.clock.clone(),
            &BatchSettings::default(),
        ));
        CarryForwardProcessor::new(Arc::new(policies), ctx, guard)
    }

    fn seed(memory: &InMemoryContext, employee_id: &str, leave_type: LeaveType, total: &str, used: &str) {
        with_transaction(memory.store.as_ref(), |tx| {
            tx.apply_delta(employee_id, leave_type, 2025, BalanceDelta::credit(dec(total)))?;
            tx.apply_delta(employee_id, leave_type, 2025, BalanceDelta::debit(dec(used)))
        })
        .unwrap();
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn test_role_override_caps_senior_carry_forward() {
        let memory = InMemoryContext::new(
            vec![
                employee("vp_001", Region::Us, Role::Vp),
                employee("emp_001", Region::Us, Role::Employee),
            ],
            vec![],
            today(),
        );
        seed(&memory, "vp_001", LeaveType::Pto, "15", "3");
        seed(&memory, "emp_001", LeaveType::Pto, "15", "7");

        let report = processor(&memory).run_period(&PeriodKey::Year(2025)).unwrap();
        assert_eq!(report.status, RunStatus::Completed);

        let vp = memory.store.balance_of("vp_001", LeaveType::Pto, 2026).unwrap();
        assert_eq!(vp.carry_forward, Decimal::ZERO);
        assert_eq!(vp.total_entitlement, dec("15"));
        assert_eq!(vp.available, dec("15"));
        assert!(vp.is_consistent());

        let regular = memory.store.balance_of("emp_001", LeaveType::Pto, 2026).unwrap();
        assert_eq!(regular.carry_forward, dec("5"));
        assert_eq!(regular.available, dec("20"));
        assert!(regular.is_consistent());

        // The closing year stays as it was.
        let closed = memory.store.balance_of("emp_001", LeaveType::Pto, 2025).unwrap();
        assert_eq!(closed.available, dec("8"));
    }

    #[test]
    fn test_accruing_types_start_from_carry_only() {
        let memory = InMemoryContext::new(
            vec![employee("emp_001", Region::India, Role::Employee)],
            vec![],
            today(),
        );
        seed(&memory, "emp_001", LeaveType::Privilege, "15", "2");
        seed(&memory, "emp_001", LeaveType::Casual, "12", "4");

        processor(&memory).run_period(&PeriodKey::Year(2025)).unwrap();

        let pl = memory
            .store
            .balance_of("emp_001", LeaveType::Privilege, 2026)
            .unwrap();
        assert_eq!(pl.carry_forward, dec("13"));
        assert_eq!(pl.total_entitlement, Decimal::ZERO);
        assert_eq!(pl.available, dec("13"));

        let cl = memory
            .store
            .balance_of("emp_001", LeaveType::Casual, 2026)
            .unwrap();
        assert_eq!(cl.carry_forward, Decimal::ZERO);
        assert_eq!(cl.available, Decimal::ZERO);

        let record = memory.store.carry_forward("emp_001", 2025).unwrap();
        let cl_entry = record
            .entries
            .iter()
            .find(|e| e.leave_type == LeaveType::Casual)
            .unwrap();
        assert_eq!(cl_entry.expired, dec("8"));
    }

    #[test]
    fn test_negative_closing_balance_carries_nothing() {
        let memory = InMemoryContext::new(
            vec![employee("emp_001", Region::India, Role::Employee)],
            vec![],
            today(),
        );
        seed(&memory, "emp_001", LeaveType::Privilege, "1", "3");

        processor(&memory).run_period(&PeriodKey::Year(2025)).unwrap();

        let pl = memory
            .store
            .balance_of("emp_001", LeaveType::Privilege, 2026)
            .unwrap();
        assert_eq!(pl.carry_forward, Decimal::ZERO);
        assert!(pl.is_consistent());
    }

    #[test]
    fn test_failed_employee_rolls_back_every_leave_type() {
        let memory = InMemoryContext::new(
            vec![
                employee("emp_001", Region::Us, Role::Employee),
                employee("emp_002", Region::Us, Role::Employee),
            ],
            vec![],
            today(),
        );
        seed(&memory, "emp_001", LeaveType::Pto, "15", "7");
        seed(&memory, "emp_002", LeaveType::Pto, "15", "7");
        memory.store.fail_balance_writes_for("emp_002");

        let processor = processor(&memory);
        let report = processor.run_period(&PeriodKey::Year(2025)).unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.processed, vec!["emp_001"]);
        assert_eq!(report.failed[0].employee_id, "emp_002");
        assert!(memory
            .store
            .balance_of("emp_002", LeaveType::Sick, 2026)
            .is_none());
        assert!(memory.store.carry_forward("emp_002", 2025).is_none());

        memory.store.clear_faults();
        let retry = processor.run_period(&PeriodKey::Year(2025)).unwrap();
        assert_eq!(retry.status, RunStatus::Completed);
        assert_eq!(retry.skipped, vec!["emp_001"]);
        assert_eq!(retry.processed, vec!["emp_002"]);
        assert_eq!(
            memory
                .store
                .balance_of("emp_002", LeaveType::Pto, 2026)
                .unwrap()
                .carry_forward,
            dec("5")
        );
    }

    #[test]
    fn test_monthly_period_is_rejected() {
        let memory = InMemoryContext::new(vec![], vec![], today());
        assert!(matches!(
            processor(&memory).run_period(&PeriodKey::month(2025, 12).unwrap()),
            Err(EngineError::Validation { .. })
        ));
    }
}
