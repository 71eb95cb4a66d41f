//! Batch period keys and the idempotency records written by batch jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LeaveType;
use crate::error::{EngineError, EngineResult};

/// Identifies the period a batch job runs for.
///
/// Months render as `YYYY-MM`, years as `YYYY`.
///
/// # Example
///
/// ```
/// use leave_engine::models::PeriodKey;
///
/// let period: PeriodKey = "2026-03".parse().unwrap();
/// assert_eq!(period, PeriodKey::month(2026, 3).unwrap());
/// assert_eq!(period.to_string(), "2026-03");
/// assert_eq!("2026".parse::<PeriodKey>().unwrap(), PeriodKey::Year(2026));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PeriodKey {
    /// A calendar month.
    Month {
        /// Year.
        year: i32,
        /// Month, 1-12.
        month: u32,
    },
    /// A calendar year.
    Year(i32),
}

impl PeriodKey {
    /// Creates a month key, validating the month number.
    pub fn month(year: i32, month: u32) -> EngineResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::Validation {
                reasons: vec![format!("month must be between 1 and 12, got {}", month)],
            });
        }
        Ok(PeriodKey::Month { year, month })
    }

    /// The calendar year the period falls in.
    pub fn year(&self) -> i32 {
        match self {
            PeriodKey::Month { year, .. } => *year,
            PeriodKey::Year(year) => *year,
        }
    }

    /// First day of the period.
    pub fn first_day(&self) -> EngineResult<NaiveDate> {
        let (year, month) = match self {
            PeriodKey::Month { year, month } => (*year, *month),
            PeriodKey::Year(year) => (*year, 1),
        };
        NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| self.out_of_range())
    }

    /// Last day of the period.
    pub fn last_day(&self) -> EngineResult<NaiveDate> {
        let (next_year, next_month) = match self {
            PeriodKey::Month { year, month: 12 } | PeriodKey::Year(year) => (*year + 1, 1),
            PeriodKey::Month { year, month } => (*year, *month + 1),
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .ok_or_else(|| self.out_of_range())
    }

    fn out_of_range(&self) -> EngineError {
        EngineError::Validation {
            reasons: vec![format!("period {} is out of the supported date range", self)],
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            PeriodKey::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Validation {
            reasons: vec![format!(
                "invalid period key '{}': expected YYYY or YYYY-MM",
                s
            )],
        };

        match s.split_once('-') {
            Some((year, month)) => {
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let month = month.parse::<u32>().map_err(|_| invalid())?;
                PeriodKey::month(year, month)
            }
            None => s.parse::<i32>().map(PeriodKey::Year).map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(value: PeriodKey) -> Self {
        value.to_string()
    }
}

/// State of a batch period run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Claimed by a run that has not finished.
    Running,
    /// Every employee processed.
    Completed,
    /// Finished with at least one employee failing; may be re-run.
    Failed,
}

/// The single-flight record for one `(job, period)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRun {
    /// Job name.
    pub job: String,
    /// Period the job ran for.
    pub period: PeriodKey,
    /// Current state.
    pub status: RunStatus,
    /// How many times the period has been claimed.
    pub attempts: u32,
    /// When the latest claim was made.
    pub started_at: DateTime<Utc>,
    /// When the latest run finished.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Employees that failed in the latest run.
    #[serde(default)]
    pub failed_employees: Vec<String>,
}

/// One leave type credited by a monthly accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualCredit {
    /// The leave type credited.
    pub leave_type: LeaveType,
    /// Days credited.
    pub days: Decimal,
    /// True when the join-day threshold halved the credit.
    pub is_pro_rated: bool,
}

/// Marks an employee as credited for a month. Unique on
/// `(employee_id, year, month)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualRecord {
    /// The employee credited.
    pub employee_id: String,
    /// Accrual year.
    pub year: i32,
    /// Accrual month.
    pub month: u32,
    /// Per leave type credits.
    pub credits: Vec<AccrualCredit>,
    /// When the credit was committed.
    pub processed_at: DateTime<Utc>,
}

/// One leave type rolled over by the annual carry-forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardEntry {
    /// The leave type rolled over.
    pub leave_type: LeaveType,
    /// Available days at the end of the closing year.
    pub previous_available: Decimal,
    /// The cap applied; `None` means uncapped.
    pub cap: Option<Decimal>,
    /// Days carried into the new year.
    pub carried: Decimal,
    /// Days that expired.
    pub expired: Decimal,
}

/// Marks an employee as rolled over out of `from_year`. Unique on
/// `(employee_id, from_year)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryForwardRecord {
    /// The employee rolled over.
    pub employee_id: String,
    /// The closing year.
    pub from_year: i32,
    /// Per leave type results.
    pub entries: Vec<CarryForwardEntry>,
    /// When the roll-over was committed.
    pub processed_at: DateTime<Utc>,
}
