//! Error types for the leave governance engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the engine can report. Each variant maps onto one
//! [`ErrorKind`] so callers can branch on validation, not-found, conflict,
//! policy-violation and system failures without inspecting messages.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{LeaveStatus, LeaveType, Region};

/// The coarse category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input or eligibility constraints failed. Never retried.
    Validation,
    /// A request, approver, employee or policy is missing.
    NotFound,
    /// The operation collides with current state; re-fetch and retry by hand.
    Conflict,
    /// Policy forbids the operation (caps, insufficient entitlement).
    PolicyViolation,
    /// Unexpected store or transport failure. The only retryable kind.
    System,
}

/// The main error type for the leave governance engine.
///
/// # Example
///
/// ```
/// use leave_engine::error::{EngineError, ErrorKind};
///
/// let error = EngineError::Validation {
///     reasons: vec!["employee is not active".to_string()],
/// };
/// assert_eq!(error.to_string(), "Validation failed: employee is not active");
/// assert_eq!(error.kind(), ErrorKind::Validation);
/// assert!(!error.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Configuration parsed but is semantically invalid.
    #[error("Invalid policy configuration: {message}")]
    InvalidPolicy {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Input or eligibility validation failed.
    #[error("Validation failed: {}", .reasons.join("; "))]
    Validation {
        /// Human-readable reasons, in check order.
        reasons: Vec<String>,
    },

    /// An entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity.
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// No policy rule exists for the leave type in the region.
    #[error("No {leave_type} policy defined for region {region}")]
    PolicyNotFound {
        /// The region.
        region: Region,
        /// The leave type.
        leave_type: LeaveType,
    },

    /// No pending approval level exists for this approver. Covers wrong
    /// approver, already-decided levels and requests no longer pending.
    #[error("No pending approval for approver '{approver_id}' on leave request {leave_request_id}")]
    AlreadyProcessed {
        /// The request.
        leave_request_id: Uuid,
        /// The approver who attempted the decision.
        approver_id: String,
    },

    /// The approver's level is pending but an earlier level is too.
    #[error(
        "Approver '{approver_id}' holds level {level} but level {current_level} of leave request {leave_request_id} is still pending"
    )]
    ApprovalOutOfTurn {
        /// The request.
        leave_request_id: Uuid,
        /// The approver who attempted the decision.
        approver_id: String,
        /// The approver's level.
        level: u8,
        /// The lowest pending level.
        current_level: u8,
    },

    /// The batch period already completed.
    #[error("{job} already completed for period {period}")]
    DuplicatePeriod {
        /// Job name.
        job: String,
        /// Period key.
        period: String,
    },

    /// Another run holds a live claim on the batch period.
    #[error("{job} is already running for period {period}")]
    PeriodInProgress {
        /// Job name.
        job: String,
        /// Period key.
        period: String,
    },

    /// The leave request can not move to the requested status.
    #[error("Invalid leave request transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: LeaveStatus,
        /// Requested status.
        to: LeaveStatus,
    },

    /// A generic state conflict, such as a duplicate key.
    #[error("Conflict: {message}")]
    Conflict {
        /// A description of the conflict.
        message: String,
    },

    /// The balance can not cover the requested days.
    #[error(
        "Insufficient {leave_type} balance for '{employee_id}': requested {requested}, available {available}"
    )]
    InsufficientBalance {
        /// The employee.
        employee_id: String,
        /// The leave type.
        leave_type: LeaveType,
        /// Days requested.
        requested: rust_decimal::Decimal,
        /// Days available.
        available: rust_decimal::Decimal,
    },

    /// A policy rule forbids the operation.
    #[error("Policy violation: {message}")]
    PolicyViolation {
        /// A description of the violation.
        message: String,
    },

    /// Walking the reporting hierarchy revisited an employee.
    #[error("Reporting hierarchy cycle detected at employee '{employee_id}'")]
    HierarchyCycle {
        /// The employee seen twice.
        employee_id: String,
    },

    /// The store failed unexpectedly.
    #[error("Store failure: {message}")]
    Store {
        /// A description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Maps the error onto its coarse category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation { .. } | EngineError::HierarchyCycle { .. } => {
                ErrorKind::Validation
            }
            EngineError::NotFound { .. } | EngineError::PolicyNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::AlreadyProcessed { .. }
            | EngineError::ApprovalOutOfTurn { .. }
            | EngineError::DuplicatePeriod { .. }
            | EngineError::PeriodInProgress { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::InsufficientBalance { .. } | EngineError::PolicyViolation { .. } => {
                ErrorKind::PolicyViolation
            }
            EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. }
            | EngineError::InvalidPolicy { .. }
            | EngineError::Store { .. } => ErrorKind::System,
        }
    }

    /// Returns true only for transient store failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store { .. })
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// A failure reported by a fire-and-forget collaborator (audit or
/// notification sink). Never escalated to an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{sink} sink failure: {message}")]
pub struct SinkError {
    /// Which sink failed.
    pub sink: &'static str,
    /// A description of the failure.
    pub message: String,
}

impl SinkError {
    /// Creates a sink error.
    pub fn new(sink: &'static str, message: impl Into<String>) -> Self {
        Self {
            sink,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/engine.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/engine.yaml"
        );
    }

    #[test]
    fn test_validation_joins_reasons() {
        let error = EngineError::Validation {
            reasons: vec![
                "MATERNITY leave is restricted to FEMALE employees".to_string(),
                "MATERNITY leave requires marital status MARRIED".to_string(),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Validation failed: MATERNITY leave is restricted to FEMALE employees; MATERNITY leave requires marital status MARRIED"
        );
    }

    #[test]
    fn test_policy_not_found_displays_region_and_type() {
        let error = EngineError::PolicyNotFound {
            region: Region::Us,
            leave_type: LeaveType::CompOff,
        };
        assert_eq!(
            error.to_string(),
            "No COMP_OFF policy defined for region US"
        );
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_already_processed_is_a_conflict() {
        let error = EngineError::AlreadyProcessed {
            leave_request_id: Uuid::nil(),
            approver_id: "mgr_001".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_insufficient_balance_is_a_policy_violation() {
        let error = EngineError::InsufficientBalance {
            employee_id: "emp_001".to_string(),
            leave_type: LeaveType::Privilege,
            requested: Decimal::new(5, 0),
            available: Decimal::new(25, 1),
        };
        assert_eq!(error.kind(), ErrorKind::PolicyViolation);
        assert_eq!(
            error.to_string(),
            "Insufficient PL balance for 'emp_001': requested 5, available 2.5"
        );
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        let store = EngineError::Store {
            message: "connection reset".to_string(),
        };
        assert_eq!(store.kind(), ErrorKind::System);
        assert!(store.is_retryable());

        let config = EngineError::InvalidPolicy {
            message: "duplicate region".to_string(),
        };
        assert_eq!(config.kind(), ErrorKind::System);
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_sink_error_display() {
        let error = SinkError::new("audit", "disk full");
        assert_eq!(error.to_string(), "audit sink failure: disk full");
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<EngineError>();
        assert_error::<SinkError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_not_found() -> EngineResult<()> {
            Err(EngineError::not_found("leave request", "abc"))
        }

        fn propagates_error() -> EngineResult<()> {
            returns_not_found()?;
            Ok(())
        }

        match propagates_error() {
            Err(EngineError::NotFound { entity, id }) => {
                assert_eq!(entity, "leave request");
                assert_eq!(id, "abc");
            }
            _ => panic!("Expected NotFound error"),
        }
    }
}
