//! Single-flight protection for batch periods.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{BatchReport, EmployeeFailure};
use crate::config::BatchSettings;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditAction, AuditEntry, Employee, EntityType, PeriodKey, PeriodRun, RunStatus,
};
use crate::store::{record_audit, with_transaction, Clock, LeaveStore, Transaction};

/// A live claim on a job period, returned by [`PeriodGuard::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodClaim {
    /// Job name.
    pub job: String,
    /// Period claimed.
    pub period: PeriodKey,
    /// Which attempt this is, starting at 1.
    pub attempt: u32,
    /// When the claim was taken.
    pub started_at: DateTime<Utc>,
}

/// Guards a job period against re-entrant execution.
///
/// | Existing run | Claim result |
/// |--------------|--------------|
/// | none | claimed, attempt 1 |
/// | COMPLETED | `DuplicatePeriod` |
/// | RUNNING, within lease | `PeriodInProgress` |
/// | RUNNING, lease expired | claimed, attempt + 1 |
/// | FAILED | claimed, attempt + 1 |
pub struct PeriodGuard {
    store: Arc<dyn LeaveStore>,
    clock: Arc<dyn Clock>,
    lease: Duration,
}

impl PeriodGuard {
    /// Creates a guard over the run records in `store`.
    pub fn new(
        store: Arc<dyn LeaveStore>,
        clock: Arc<dyn Clock>,
        settings: &BatchSettings,
    ) -> Self {
        Self {
            store,
            clock,
            lease: Duration::try_minutes(settings.lease_minutes).unwrap_or(Duration::MAX),
        }
    }

    /// Claims a period, recording it as RUNNING.
    pub fn claim(&self, job: &str, period: &PeriodKey) -> EngineResult<PeriodClaim> {
        let now = self.clock.now();

        with_transaction(self.store.as_ref(), |tx| {
            let attempt = match tx.period_run(job, period)? {
                None => 1,
                Some(run) => match run.status {
                    RunStatus::Completed => {
                        return Err(EngineError::DuplicatePeriod {
                            job: job.to_string(),
                            period: period.to_string(),
                        });
                    }
                    RunStatus::Running
                        if run
                            .started_at
                            .checked_add_signed(self.lease)
                            .is_none_or(|expires| expires > now) =>
                    {
                        return Err(EngineError::PeriodInProgress {
                            job: job.to_string(),
                            period: period.to_string(),
                        });
                    }
                    RunStatus::Running => {
                        warn!(
                            job = %job,
                            period = %period,
                            started_at = %run.started_at,
                            "Taking over abandoned batch run"
                        );
                        run.attempts + 1
                    }
                    RunStatus::Failed => run.attempts + 1,
                },
            };

            tx.put_period_run(PeriodRun {
                job: job.to_string(),
                period: *period,
                status: RunStatus::Running,
                attempts: attempt,
                started_at: now,
                finished_at: None,
                failed_employees: Vec::new(),
            })?;

            Ok(PeriodClaim {
                job: job.to_string(),
                period: *period,
                attempt,
                started_at: now,
            })
        })
    }

    /// Closes a claim: COMPLETED if no employee failed, FAILED otherwise.
    pub fn finish(
        &self,
        claim: &PeriodClaim,
        failed_employees: Vec<String>,
    ) -> EngineResult<PeriodRun> {
        let status = if failed_employees.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        let run = PeriodRun {
            job: claim.job.clone(),
            period: claim.period,
            status,
            attempts: claim.attempt,
            started_at: claim.started_at,
            finished_at: Some(self.clock.now()),
            failed_employees,
        };

        with_transaction(self.store.as_ref(), |tx| tx.put_period_run(run.clone()))?;
        Ok(run)
    }
}

/// What happened to one employee in a batch run.
pub(crate) enum EmployeeOutcome {
    /// Effects were applied; carries audit details.
    Processed(serde_json::Value),
    /// Nothing to do, usually because the period was already applied.
    Skipped,
}

/// Runs a claimed period over employees, one transaction per employee.
///
/// A failing employee is rolled back and recorded; the run continues with
/// the next one and the period ends FAILED so a later trigger can retry it.
pub(crate) fn run_guarded<F>(
    guard: &PeriodGuard,
    ctx: &EngineContext,
    job: &str,
    period: &PeriodKey,
    employees: Vec<Employee>,
    mut apply: F,
) -> EngineResult<BatchReport>
where
    F: FnMut(&Employee, &mut dyn Transaction) -> EngineResult<EmployeeOutcome>,
{
    let claim = guard.claim(job, period)?;
    info!(
        job = %job,
        period = %period,
        attempt = claim.attempt,
        employees = employees.len(),
        "Starting batch run"
    );

    let mut report = BatchReport::new(job, *period);
    for employee in &employees {
        match with_transaction(ctx.store.as_ref(), |tx| apply(employee, tx)) {
            Ok(EmployeeOutcome::Processed(details)) => {
                debug!(
                    job = %job,
                    period = %period,
                    employee_id = %employee.id,
                    "Applied batch period"
                );
                record_audit(
                    ctx.audit.as_ref(),
                    AuditEntry::new(
                        job,
                        AuditAction::BalanceMutated,
                        EntityType::LeaveBalance,
                        format!("{}/{}", employee.id, period),
                        ctx.clock.now(),
                    )
                    .with_details(details),
                    &mut report.warnings,
                );
                report.processed.push(employee.id.clone());
            }
            Ok(EmployeeOutcome::Skipped) => {
                debug!(
                    job = %job,
                    period = %period,
                    employee_id = %employee.id,
                    "Skipped employee"
                );
                report.skipped.push(employee.id.clone());
            }
            Err(e) => {
                warn!(
                    job = %job,
                    period = %period,
                    employee_id = %employee.id,
                    error = %e,
                    "Batch run failed for employee"
                );
                report.failed.push(EmployeeFailure {
                    employee_id: employee.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let failed_ids = report.failed.iter().map(|f| f.employee_id.clone()).collect();
    let run = guard.finish(&claim, failed_ids)?;
    report.status = run.status;

    record_audit(
        ctx.audit.as_ref(),
        AuditEntry::new(
            job,
            AuditAction::PeriodCompleted,
            EntityType::BatchPeriod,
            format!("{}/{}", job, period),
            ctx.clock.now(),
        )
        .with_details(json!({
            "status": run.status,
            "attempt": run.attempts,
            "processed": report.processed.len(),
            "skipped": report.skipped.len(),
            "failed": report.failed.len(),
        })),
        &mut report.warnings,
    );

    info!(
        job = %job,
        period = %period,
        status = ?run.status,
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Finished batch run"
    );
    Ok(report)
}
