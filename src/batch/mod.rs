//! Periodic balance jobs: monthly accrual and annual carry-forward.
//!
//! Jobs are driven through [`PeriodJob::run_period`] with an explicit
//! [`crate::models::PeriodKey`], so any trigger (cron, an operator, a test)
//! can run any period. Each run is single-flight per `(job, period)` via
//! [`PeriodGuard`], and each employee's changes for a period are committed in
//! one transaction together with the record that marks them applied.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::NaiveDate;
//! use leave_engine::batch::{AccrualProcessor, BatchScheduler, PeriodGuard};
//! use leave_engine::config::{BatchSettings, ConfigLoader};
//! use leave_engine::context::InMemoryContext;
//! use leave_engine::models::PeriodKey;
//!
//! let (_, policies) = ConfigLoader::load("./config/leave_policy")?.into_parts();
//! let fixture = InMemoryContext::new(vec![], vec![], NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
//! let ctx = fixture.context();
//! let guard = Arc::new(PeriodGuard::new(ctx.store.clone(), ctx.clock.clone(), &BatchSettings::default()));
//!
//! let mut scheduler = BatchScheduler::new();
//! scheduler.register(Arc::new(AccrualProcessor::new(Arc::new(policies), ctx, guard)));
//!
//! let report = scheduler.run("monthly_accrual", &"2026-03".parse::<PeriodKey>()?)?;
//! assert!(report.failed.is_empty());
//! # Ok::<(), leave_engine::error::EngineError>(())
//! ```

mod accrual;
mod carry_forward;
mod guard;
mod scheduler;

pub use accrual::{calculate_monthly_accrual, AccrualProcessor, MonthlyAccrual};
pub use carry_forward::CarryForwardProcessor;
pub use guard::{PeriodClaim, PeriodGuard};
pub use scheduler::{BatchReport, BatchScheduler, EmployeeFailure, PeriodJob};
