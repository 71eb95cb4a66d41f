//! Period jobs and the scheduler that dispatches them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{PeriodKey, RunStatus};

/// An employee whose period work was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeFailure {
    /// The employee.
    pub employee_id: String,
    /// The error that rolled their transaction back.
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Job name.
    pub job: String,
    /// Period processed.
    pub period: PeriodKey,
    /// Final run status.
    pub status: RunStatus,
    /// Employees whose balances changed.
    pub processed: Vec<String>,
    /// Employees with nothing to apply.
    pub skipped: Vec<String>,
    /// Employees rolled back.
    pub failed: Vec<EmployeeFailure>,
    /// Audit sink failures.
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub(crate) fn new(job: &str, period: PeriodKey) -> Self {
        Self {
            job: job.to_string(),
            period,
            status: RunStatus::Running,
            processed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// A batch job that runs once per period.
pub trait PeriodJob: Send + Sync {
    /// Stable job name, used as the idempotency key.
    fn name(&self) -> &'static str;

    /// Runs the job for one period.
    fn run_period(&self, period: &PeriodKey) -> EngineResult<BatchReport>;
}

/// Dispatches period runs to registered jobs by name.
///
/// Whatever triggers a run (cron, an operator, a test) goes through
/// [`BatchScheduler::run`]; each job's own guard makes repeated triggers
/// harmless.
#[derive(Default)]
pub struct BatchScheduler {
    jobs: BTreeMap<&'static str, Arc<dyn PeriodJob>>,
}

impl BatchScheduler {
    /// Creates a scheduler with no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job, replacing any job with the same name.
    pub fn register(&mut self, job: Arc<dyn PeriodJob>) {
        self.jobs.insert(job.name(), job);
    }

    /// Names of the registered jobs, sorted.
    pub fn jobs(&self) -> Vec<&'static str> {
        self.jobs.keys().copied().collect()
    }

    /// Runs `job` for `period`.
    pub fn run(&self, job: &str, period: &PeriodKey) -> EngineResult<BatchReport> {
        let job = self
            .jobs
            .get(job)
            .ok_or_else(|| EngineError::not_found("batch job", job))?;
        job.run_period(period)
    }
}
