//! Comp-off work logs.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a work-log date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkType {
    /// Saturday or Sunday.
    Weekend,
    /// A declared holiday for the employee's region.
    Holiday,
    /// A weekday worked beyond a standard day. Never earns comp-off.
    ExtendedHours,
    /// Anything else, including failed input validation.
    Invalid,
}

/// Verification status of a work log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkLogStatus {
    /// Awaiting manager verification; contributes no balance.
    Pending,
    /// Verified and credited.
    Verified,
    /// Rejected by the manager.
    Rejected,
}

impl fmt::Display for WorkLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkLogStatus::Pending => write!(f, "PENDING"),
            WorkLogStatus::Verified => write!(f, "VERIFIED"),
            WorkLogStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A submitted extra-hours work entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompOffWorkLog {
    /// Unique identifier for the log.
    pub id: Uuid,
    /// The employee who worked.
    pub employee_id: String,
    /// The day worked.
    pub work_date: NaiveDate,
    /// Hours worked that day.
    pub hours_worked: Decimal,
    /// How the day was classified.
    pub work_type: WorkType,
    /// Comp-off hours earned.
    pub comp_off_earned: Decimal,
    /// Whether the direct manager verified the entry.
    pub verified: bool,
    /// Current status.
    pub status: WorkLogStatus,
    /// Who verified or rejected the entry.
    #[serde(default)]
    pub verified_by: Option<String>,
    /// When it was verified or rejected.
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    /// Days posted to the COMP_OFF balance on verification.
    #[serde(default)]
    pub credited_days: Decimal,
    /// Hours left over after conversion; not separately creditable.
    #[serde(default)]
    pub remainder_hours: Decimal,
    /// Verifier comments.
    #[serde(default)]
    pub comments: Option<String>,
    /// When the log was submitted.
    pub submitted_at: DateTime<Utc>,
}
