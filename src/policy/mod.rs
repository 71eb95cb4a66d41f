//! Policy rule engine.
//!
//! Pure lookup and computation over the regional policies loaded by
//! [`crate::config::ConfigLoader`]. No external calls; safe for concurrent
//! reads.

mod engine;

pub use engine::{PolicyRuleEngine, ResolvedPolicy};
