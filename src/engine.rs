//! The assembled engine.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::approval::{ApprovalStateMachine, CancelOutcome, DecisionOutcome};
use crate::batch::{
    AccrualProcessor, BatchReport, BatchScheduler, CarryForwardProcessor, PeriodGuard,
};
use crate::comp_off::{CompOffConverter, CompOffService, WorkLogDecision, WorkLogSubmission};
use crate::config::{ConfigLoader, EngineSettings};
use crate::context::EngineContext;
use crate::eligibility::{EligibilityResult, EligibilityValidator};
use crate::error::EngineResult;
use crate::models::{DecisionAction, LeaveBalance, LeaveRequest, LeaveType, PeriodKey};
use crate::policy::PolicyRuleEngine;
use crate::service::{LeaveApplication, LeaveService, Submission};
use crate::store::with_transaction;

/// Every engine component wired to one configuration and one set of
/// collaborators.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use leave_engine::context::InMemoryContext;
/// use leave_engine::engine::LeaveEngine;
/// use leave_engine::models::{Employee, EmployeeStatus, Gender, LeaveType, MaritalStatus, Region, Role};
///
/// let employee = Employee {
///     id: "emp_001".to_string(),
///     region: Region::Us,
///     role: Role::Employee,
///     reporting_manager_id: None,
///     gender: Gender::Male,
///     marital_status: MaritalStatus::Single,
///     joining_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
///     status: EmployeeStatus::Active,
/// };
/// let fixture = InMemoryContext::new(vec![employee], vec![], NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
/// let engine = LeaveEngine::from_dir("./config/leave_policy", fixture.context())?;
///
/// engine.provision_annual_grants("emp_001", 2026)?;
/// let pto = engine.balance("emp_001", LeaveType::Pto, 2026)?;
/// assert_eq!(pto.available.to_string(), "15");
/// # Ok::<(), leave_engine::error::EngineError>(())
/// ```
pub struct LeaveEngine {
    settings: EngineSettings,
    policies: Arc<PolicyRuleEngine>,
    eligibility: EligibilityValidator,
    leave: LeaveService,
    approvals: ApprovalStateMachine,
    comp_off: CompOffService,
    scheduler: BatchScheduler,
    ctx: EngineContext,
}

impl LeaveEngine {
    /// Loads configuration from `path` and builds the engine.
    pub fn from_dir<P: AsRef<Path>>(path: P, ctx: EngineContext) -> EngineResult<Self> {
        Ok(Self::new(ConfigLoader::load(path)?, ctx))
    }

    /// Builds the engine from a loaded configuration.
    pub fn new(loader: ConfigLoader, ctx: EngineContext) -> Self {
        let (settings, policies) = loader.into_parts();
        let policies = Arc::new(policies);

        let converter = Arc::new(CompOffConverter::new(
            settings.comp_off.clone(),
            ctx.holidays.clone(),
            ctx.clock.clone(),
        ));
        let guard = Arc::new(PeriodGuard::new(
            ctx.store.clone(),
            ctx.clock.clone(),
            &settings.batch,
        ));

        let mut scheduler = BatchScheduler::new();
        scheduler.register(Arc::new(AccrualProcessor::new(
            policies.clone(),
            ctx.clone(),
            guard.clone(),
        )));
        scheduler.register(Arc::new(CarryForwardProcessor::new(
            policies.clone(),
            ctx.clone(),
            guard,
        )));

        Self {
            eligibility: EligibilityValidator::new(policies.clone()),
            leave: LeaveService::new(policies.clone(), ctx.clone(), settings.approval.clone()),
            approvals: ApprovalStateMachine::new(
                policies.clone(),
                ctx.clone(),
                settings.approval.clone(),
            ),
            comp_off: CompOffService::new(policies.clone(), converter, ctx.clone()),
            scheduler,
            settings,
            policies,
            ctx,
        }
    }

    /// The engine settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The shared policy engine.
    pub fn policies(&self) -> &Arc<PolicyRuleEngine> {
        &self.policies
    }

    /// The batch scheduler with both periodic jobs registered.
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Checks eligibility without submitting anything.
    pub fn check_eligibility(
        &self,
        employee_id: &str,
        leave_type: LeaveType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<EligibilityResult> {
        let employee = self.ctx.employees.get(employee_id)?;
        let existing = with_transaction(self.ctx.store.as_ref(), |tx| {
            tx.requests_for_employee(employee_id)
        })?;
        Ok(self
            .eligibility
            .validate(&employee, leave_type, start, end, &existing))
    }

    /// See [`LeaveService::submit`].
    pub fn submit(&self, application: LeaveApplication) -> EngineResult<Submission> {
        self.leave.submit(application)
    }

    /// See [`LeaveService::request`].
    pub fn request(&self, leave_request_id: Uuid) -> EngineResult<LeaveRequest> {
        self.leave.request(leave_request_id)
    }

    /// See [`ApprovalStateMachine::process_decision`].
    pub fn process_decision(
        &self,
        leave_request_id: Uuid,
        approver_id: &str,
        action: DecisionAction,
        comments: Option<String>,
    ) -> EngineResult<DecisionOutcome> {
        self.approvals
            .process_decision(leave_request_id, approver_id, action, comments)
    }

    /// See [`ApprovalStateMachine::cancel`].
    pub fn cancel(&self, leave_request_id: Uuid, actor_id: &str) -> EngineResult<CancelOutcome> {
        self.approvals.cancel(leave_request_id, actor_id)
    }

    /// See [`CompOffService::submit_work_log`].
    pub fn submit_work_log(
        &self,
        employee_id: &str,
        work_date: NaiveDate,
        hours_worked: Decimal,
    ) -> EngineResult<WorkLogSubmission> {
        self.comp_off
            .submit_work_log(employee_id, work_date, hours_worked)
    }

    /// See [`CompOffService::verify_work_log`].
    pub fn verify_work_log(
        &self,
        work_log_id: Uuid,
        verifier_id: &str,
        action: DecisionAction,
        comments: Option<String>,
    ) -> EngineResult<WorkLogDecision> {
        self.comp_off
            .verify_work_log(work_log_id, verifier_id, action, comments)
    }

    /// See [`LeaveService::provision_annual_grants`].
    pub fn provision_annual_grants(
        &self,
        employee_id: &str,
        year: i32,
    ) -> EngineResult<Vec<LeaveBalance>> {
        self.leave.provision_annual_grants(employee_id, year)
    }

    /// See [`LeaveService::balance`].
    pub fn balance(
        &self,
        employee_id: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> EngineResult<LeaveBalance> {
        self.leave.balance(employee_id, leave_type, year)
    }

    /// Runs a registered batch job for a period.
    pub fn run_batch(&self, job: &str, period: &PeriodKey) -> EngineResult<BatchReport> {
        self.scheduler.run(job, period)
    }

    /// Runs the monthly accrual for `year`-`month`.
    pub fn run_monthly_accrual(&self, year: i32, month: u32) -> EngineResult<BatchReport> {
        self.run_batch(AccrualProcessor::JOB, &PeriodKey::month(year, month)?)
    }

    /// Rolls balances out of `from_year` into the following year.
    pub fn run_carry_forward(&self, from_year: i32) -> EngineResult<BatchReport> {
        self.run_batch(CarryForwardProcessor::JOB, &PeriodKey::Year(from_year))
    }
}
