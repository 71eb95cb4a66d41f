//! Configuration loading and management for the leave governance engine.
//!
//! This module provides functionality to load leave policy configuration from
//! YAML files: engine-wide settings plus one policy file per region.
//!
//! # Example
//!
//! ```no_run
//! use leave_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/leave_policy").unwrap();
//! println!("Loaded {} regions", config.config().regions.len());
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AccrualSettings, ApprovalSettings, BatchSettings, CarryForwardRule, CompOffSettings,
    DocumentationRule, EligibilityRule, EngineConfig, EngineSettings, Entitlement,
    MissingApproverPolicy, NotificationSettings, PolicyRule, RegionPolicy, RejectionPolicy,
    RoleOverride,
};
