//! Leave types and leave requests.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// A category of leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeaveType {
    /// Casual leave (accruing).
    #[serde(rename = "CL")]
    Casual,
    /// Privilege / earned leave (accruing).
    #[serde(rename = "PL")]
    Privilege,
    /// Sick leave.
    #[serde(rename = "SL")]
    Sick,
    /// Paid time off.
    #[serde(rename = "PTO")]
    Pto,
    /// Maternity leave.
    #[serde(rename = "MATERNITY")]
    Maternity,
    /// Paternity leave.
    #[serde(rename = "PATERNITY")]
    Paternity,
    /// Bereavement leave.
    #[serde(rename = "BEREAVEMENT")]
    Bereavement,
    /// Compensatory leave earned by weekend or holiday work.
    #[serde(rename = "COMP_OFF")]
    CompOff,
    /// Leave without pay.
    #[serde(rename = "LWP")]
    LeaveWithoutPay,
}

impl LeaveType {
    /// Returns the canonical configuration code for the leave type.
    pub fn code(&self) -> &'static str {
        match self {
            LeaveType::Casual => "CL",
            LeaveType::Privilege => "PL",
            LeaveType::Sick => "SL",
            LeaveType::Pto => "PTO",
            LeaveType::Maternity => "MATERNITY",
            LeaveType::Paternity => "PATERNITY",
            LeaveType::Bereavement => "BEREAVEMENT",
            LeaveType::CompOff => "COMP_OFF",
            LeaveType::LeaveWithoutPay => "LWP",
        }
    }
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Overall status of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    /// Saved but not submitted.
    Draft,
    /// Submitted; approval levels in progress.
    Pending,
    /// Every approval level approved.
    Approved,
    /// Rejected at some level.
    Rejected,
    /// Withdrawn before a decision.
    Cancelled,
}

impl LeaveStatus {
    /// Returns true for statuses that admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }

    /// Returns true for statuses that hold days against the calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Draft, LeaveStatus::Pending)
                | (LeaveStatus::Draft, LeaveStatus::Cancelled)
                | (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
                | (LeaveStatus::Pending, LeaveStatus::Cancelled)
        )
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveStatus::Draft => write!(f, "DRAFT"),
            LeaveStatus::Pending => write!(f, "PENDING"),
            LeaveStatus::Approved => write!(f, "APPROVED"),
            LeaveStatus::Rejected => write!(f, "REJECTED"),
            LeaveStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A leave request.
///
/// Status is mutated only by the approval state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Unique identifier for the request.
    pub id: Uuid,
    /// The applicant.
    pub employee_id: String,
    /// The requested leave type.
    pub leave_type: LeaveType,
    /// First day of leave (inclusive).
    pub start_date: NaiveDate,
    /// Last day of leave (inclusive).
    pub end_date: NaiveDate,
    /// Days to debit on final approval; may be fractional for half days.
    pub total_days: Decimal,
    /// Current status.
    pub status: LeaveStatus,
    /// Free-text reason supplied by the applicant.
    #[serde(default)]
    pub reason: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Returns true if the request's date range shares at least one day
    /// with `start..=end`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    /// The balance year this request is debited against.
    pub fn balance_year(&self) -> i32 {
        self.start_date.year()
    }

    /// Moves the request to `next`, refusing illegal transitions.
    pub fn transition_to(&mut self, next: LeaveStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
