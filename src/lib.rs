//! Leave Governance Engine
//!
//! This crate decides whether an employee may take leave, who must approve
//! it and in what order, how approval decisions advance a request, and how
//! leave balances grow (monthly accrual, comp-off credit) and roll over
//! (annual carry-forward). Leave policy is declared per region in YAML and
//! loaded through [`config::ConfigLoader`].
//!
//! Persistence, employees, role holders, holidays, notifications and audit
//! all belong to the host application and are reached through the traits in
//! [`store`] and [`notification`]; in-memory implementations of each are
//! included.

#![warn(missing_docs)]

pub mod approval;
pub mod batch;
pub mod comp_off;
pub mod config;
pub mod context;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod models;
pub mod notification;
pub mod policy;
pub mod service;
pub mod store;
