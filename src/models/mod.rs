//! Core data models for the leave governance engine.
//!
//! This module contains all the domain records the engine reads and writes.

mod approval;
mod audit;
mod balance;
mod batch;
mod comp_off;
mod employee;
mod holiday;
mod leave;

pub use approval::{ApprovalRecord, ApprovalStatus, ApproverKind, DecisionAction};
pub use audit::{AuditAction, AuditEntry, EntityType};
pub use balance::{BalanceDelta, BalanceKey, LeaveBalance};
pub use batch::{
    AccrualCredit, AccrualRecord, CarryForwardEntry, CarryForwardRecord, PeriodKey, PeriodRun,
    RunStatus,
};
pub use comp_off::{CompOffWorkLog, WorkLogStatus, WorkType};
pub use employee::{Employee, EmployeeStatus, Gender, MaritalStatus, Region, Role};
pub use holiday::Holiday;
pub use leave::{LeaveRequest, LeaveStatus, LeaveType};
