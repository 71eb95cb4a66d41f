//! Approval chain construction and the per-level decision state machine.
//!
//! A request's chain is built once, at submission, from the policy's
//! approver sequence and the reporting hierarchy. Each resolved level
//! becomes one PENDING [`crate::models::ApprovalRecord`]; levels are then
//! decided strictly in order by [`ApprovalStateMachine`].

mod chain;
mod state_machine;

pub use chain::{ApprovalChain, ApprovalChainBuilder, ChainLevel, OmittedLevel};
pub use state_machine::{ApprovalStateMachine, CancelOutcome, DecisionOutcome, NextApproval};
