//! Configuration types for leave governance.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files: engine-wide settings
//! (`engine.yaml`) and one regional policy per file (`regions/*.yaml`).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ApproverKind, Gender, LeaveType, MaritalStatus, Region, Role};

/// What happens to still-pending levels when a request is rejected or
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Leave later levels PENDING for the audit trail.
    #[default]
    RetainPending,
    /// Mark later levels SUPERSEDED in the same transaction.
    SupersedePending,
}

/// What happens when a chain level's approver can not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingApproverPolicy {
    /// Drop the level and build a shorter chain.
    #[default]
    Omit,
    /// Fail chain construction.
    Fail,
}

/// Approval chain and state machine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSettings {
    /// Handling of pending levels after rejection or cancellation.
    pub on_rejection: RejectionPolicy,
    /// Handling of unresolvable approvers.
    pub missing_approver: MissingApproverPolicy,
    /// Upper bound on manager hops when walking the hierarchy.
    pub max_hierarchy_depth: usize,
    /// Attempts made on a decision when the store fails transiently.
    pub max_store_attempts: u32,
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            on_rejection: RejectionPolicy::RetainPending,
            missing_approver: MissingApproverPolicy::Omit,
            max_hierarchy_depth: 8,
            max_store_attempts: 3,
        }
    }
}

/// Comp-off conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompOffSettings {
    /// Minimum weekend/holiday hours that earn comp-off.
    pub min_hours: Decimal,
    /// Oldest work date accepted, in days before today.
    pub staleness_days: i64,
    /// Hours in a full comp-off day.
    pub hours_per_day: Decimal,
    /// Leftover hours that earn a half day.
    pub half_day_hours: Decimal,
    /// Comp-off hours earned per hour worked.
    pub rate: Decimal,
}

impl Default for CompOffSettings {
    fn default() -> Self {
        Self {
            min_hours: Decimal::new(5, 0),
            staleness_days: 30,
            hours_per_day: Decimal::new(8, 0),
            half_day_hours: Decimal::new(5, 0),
            rate: Decimal::ONE,
        }
    }
}

/// Batch job settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Minutes after which a RUNNING claim is considered abandoned.
    pub lease_minutes: i64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { lease_minutes: 60 }
    }
}

/// Notification retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Maximum queued deliveries; the oldest is dropped on overflow.
    pub retry_capacity: usize,
    /// Delivery attempts before a notification is abandoned.
    pub max_attempts: u32,
    /// Base backoff; attempt `n` waits `n * backoff_seconds`.
    pub backoff_seconds: i64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            retry_capacity: 256,
            max_attempts: 5,
            backoff_seconds: 60,
        }
    }
}

/// Engine-wide settings from `engine.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Approval settings.
    pub approval: ApprovalSettings,
    /// Comp-off settings.
    pub comp_off: CompOffSettings,
    /// Batch settings.
    pub batch: BatchSettings,
    /// Notification settings.
    pub notifications: NotificationSettings,
}

/// How a leave type's entitlement is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entitlement {
    /// Credited monthly by the accrual batch.
    MonthlyAccrual {
        /// Days credited per full month.
        monthly_rate: Decimal,
    },
    /// Granted once per year at roll-over.
    FlatAnnual {
        /// Days granted per year.
        days: Decimal,
    },
    /// Credited from verified comp-off work logs.
    Earned,
    /// Not balance-bound (for example leave without pay).
    Unlimited,
}

impl Entitlement {
    /// The monthly accrual rate, for accruing types.
    pub fn monthly_rate(&self) -> Option<Decimal> {
        match self {
            Entitlement::MonthlyAccrual { monthly_rate } => Some(*monthly_rate),
            _ => None,
        }
    }

    /// The flat annual grant, for annual-grant types.
    pub fn annual_grant(&self) -> Option<Decimal> {
        match self {
            Entitlement::FlatAnnual { days } => Some(*days),
            _ => None,
        }
    }

    /// Returns true if requests must be covered by an available balance.
    pub fn is_balance_bound(&self) -> bool {
        !matches!(self, Entitlement::Unlimited)
    }
}

/// How unused balance rolls into the next year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CarryForwardRule {
    /// Nothing carries; the balance is zeroed.
    #[default]
    Expire,
    /// Carries up to a cap.
    Capped {
        /// Maximum days carried.
        max_days: Decimal,
    },
    /// Everything carries.
    Unlimited,
}

impl CarryForwardRule {
    /// The effective cap; `None` means uncapped.
    pub fn cap(&self) -> Option<Decimal> {
        match self {
            CarryForwardRule::Expire => Some(Decimal::ZERO),
            CarryForwardRule::Capped { max_days } => Some(*max_days),
            CarryForwardRule::Unlimited => None,
        }
    }

    /// Days carried out of a closing balance. Negative balances carry
    /// nothing.
    pub fn carry(&self, previous_available: Decimal) -> Decimal {
        let carryable = previous_available.max(Decimal::ZERO);
        match self.cap() {
            Some(cap) => carryable.min(cap),
            None => carryable,
        }
    }
}

/// Who may apply for a leave type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityRule {
    /// Required gender, if restricted.
    pub gender: Option<Gender>,
    /// Required marital status, if restricted.
    pub marital_status: Option<MaritalStatus>,
    /// Complete months of service required at the leave start date.
    pub min_service_months: u32,
}

/// Supporting documents expected for long requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationRule {
    /// Documents become required once a request exceeds this many days.
    pub required_after_days: u32,
    /// Names of the expected documents.
    pub documents: Vec<String>,
}

/// Role-specific replacements layered on a regional rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleOverride {
    /// Replacement entitlement.
    pub entitlement: Option<Entitlement>,
    /// Replacement carry-forward rule.
    pub carry_forward: Option<CarryForwardRule>,
}

/// The regional default rule for one leave type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// How entitlement is granted.
    pub entitlement: Entitlement,
    /// Who may apply.
    #[serde(default)]
    pub eligibility: EligibilityRule,
    /// Roll-over rule.
    #[serde(default)]
    pub carry_forward: CarryForwardRule,
    /// Ordered approver sequence; its length is the required level count.
    pub approval: Vec<ApproverKind>,
    /// At most one pending or approved request per calendar year.
    #[serde(default)]
    pub once_per_year: bool,
    /// An active request of this type forbids other leave during its span.
    #[serde(default)]
    pub blocking: bool,
    /// Documentation expected for long requests.
    #[serde(default)]
    pub documentation: Option<DocumentationRule>,
    /// Per-role overrides.
    #[serde(default)]
    pub role_overrides: BTreeMap<Role, RoleOverride>,
}

/// Regional accrual settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccrualSettings {
    /// Joining on or before this day of the month earns the full monthly
    /// rate in the joining month; later joiners earn half.
    pub join_day_threshold: u32,
}

impl Default for AccrualSettings {
    fn default() -> Self {
        Self {
            join_day_threshold: 15,
        }
    }
}

/// A regional policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPolicy {
    /// The region the policy governs.
    pub region: Region,
    /// Accrual settings.
    #[serde(default)]
    pub accrual: AccrualSettings,
    /// Rules by leave type.
    pub leave_types: BTreeMap<LeaveType, PolicyRule>,
}

/// The complete configuration loaded from a configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine-wide settings.
    pub settings: EngineSettings,
    /// Regional policies sorted by region.
    pub regions: Vec<RegionPolicy>,
}
