//! Approval chain construction.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ApprovalSettings, MissingApproverPolicy};
use crate::error::{EngineError, EngineResult};
use crate::models::{ApprovalRecord, ApproverKind, Employee, LeaveType};
use crate::policy::PolicyRuleEngine;
use crate::store::{EmployeeDirectory, RoleDirectory};

/// One resolved level of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLevel {
    /// 1-based level, consecutive across resolved levels.
    pub level: u8,
    /// Who decides this level.
    pub approver_id: String,
    /// Which configured approver kind produced the level.
    pub approver_role: ApproverKind,
}

/// A configured level that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedLevel {
    /// 1-based position in the configured approver sequence.
    pub position: u8,
    /// The configured approver kind.
    pub approver_role: ApproverKind,
    /// Why no approver was found.
    pub reason: String,
}

/// The ordered approvers for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalChain {
    /// The request the chain belongs to.
    pub leave_request_id: Uuid,
    /// Resolved levels in decision order.
    pub levels: Vec<ChainLevel>,
    /// Configured levels dropped for lack of an approver.
    pub omitted: Vec<OmittedLevel>,
}

impl ApprovalChain {
    /// The level that decides first.
    pub fn first(&self) -> Option<&ChainLevel> {
        self.levels.first()
    }

    /// Returns true if no level could be resolved.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns true if any configured level was omitted.
    pub fn is_shortened(&self) -> bool {
        !self.omitted.is_empty()
    }

    /// PENDING approval records for every resolved level.
    pub fn to_records(&self) -> Vec<ApprovalRecord> {
        self.levels
            .iter()
            .map(|level| {
                ApprovalRecord::pending(
                    self.leave_request_id,
                    level.level,
                    level.approver_id.clone(),
                    level.approver_role,
                )
            })
            .collect()
    }
}

/// Builds approval chains from policy and the reporting hierarchy.
///
/// Management tiers are found by walking `reporting_manager_id` links from
/// the applicant, at most `max_hierarchy_depth` hops, failing with
/// `HierarchyCycle` if an employee is visited twice. Role levels are
/// resolved through the role directory, independent of the hierarchy.
///
/// A level is unresolved when its manager is missing, unknown or inactive,
/// when no active role holder exists, or when the approver would be the
/// applicant. Unresolved levels are omitted or fail the build according to
/// [`MissingApproverPolicy`]. An approver who resolves at several levels
/// decides once, at the first of them.
pub struct ApprovalChainBuilder {
    policies: Arc<PolicyRuleEngine>,
    employees: Arc<dyn EmployeeDirectory>,
    roles: Arc<dyn RoleDirectory>,
    settings: ApprovalSettings,
}

impl ApprovalChainBuilder {
    /// Creates a builder.
    pub fn new(
        policies: Arc<PolicyRuleEngine>,
        employees: Arc<dyn EmployeeDirectory>,
        roles: Arc<dyn RoleDirectory>,
        settings: ApprovalSettings,
    ) -> Self {
        Self {
            policies,
            employees,
            roles,
            settings,
        }
    }

    /// Builds the chain for a request.
    pub fn build(
        &self,
        leave_request_id: Uuid,
        employee_id: &str,
        leave_type: LeaveType,
    ) -> EngineResult<ApprovalChain> {
        let employee = self.employees.get(employee_id)?;
        let policy = self
            .policies
            .resolve(employee.region, leave_type, employee.role)?;

        let tiers = policy
            .approval
            .iter()
            .filter_map(ApproverKind::hierarchy_tier)
            .max()
            .unwrap_or(0);
        let hierarchy = self.walk_managers(&employee, tiers)?;

        let mut chain = ApprovalChain {
            leave_request_id,
            levels: Vec::with_capacity(policy.approval.len()),
            omitted: Vec::new(),
        };

        for (index, kind) in policy.approval.iter().enumerate() {
            let position = (index + 1) as u8;
            let resolved = match kind.hierarchy_tier() {
                Some(tier) => hierarchy.manager(tier),
                None => self.role_holder(kind)?,
            }
            .and_then(|approver_id| {
                if approver_id == employee.id {
                    Err("the approver would be the applicant".to_string())
                } else {
                    Ok(approver_id)
                }
            });

            match resolved {
                Ok(approver_id) if chain.levels.iter().any(|l| l.approver_id == approver_id) => {
                    debug!(
                        leave_request_id = %leave_request_id,
                        position,
                        approver_id = %approver_id,
                        approver = %kind,
                        "Approver already holds an earlier level"
                    );
                }
                Ok(approver_id) => {
                    let level = (chain.levels.len() + 1) as u8;
                    chain.levels.push(ChainLevel {
                        level,
                        approver_id,
                        approver_role: *kind,
                    });
                }
                Err(reason) => match self.settings.missing_approver {
                    MissingApproverPolicy::Omit => {
                        warn!(
                            leave_request_id = %leave_request_id,
                            employee_id = %employee.id,
                            position,
                            approver = %kind,
                            reason = %reason,
                            "Omitting unresolved approval level"
                        );
                        chain.omitted.push(OmittedLevel {
                            position,
                            approver_role: *kind,
                            reason,
                        });
                    }
                    MissingApproverPolicy::Fail => {
                        return Err(EngineError::NotFound {
                            entity: "approver".to_string(),
                            id: format!(
                                "{} for level {} of leave request {}: {}",
                                kind, position, leave_request_id, reason
                            ),
                        });
                    }
                },
            }
        }

        info!(
            leave_request_id = %leave_request_id,
            employee_id = %employee.id,
            leave_type = %leave_type,
            levels = chain.levels.len(),
            omitted = chain.omitted.len(),
            "Built approval chain"
        );
        Ok(chain)
    }

    fn role_holder(&self, kind: &ApproverKind) -> EngineResult<Result<String, String>> {
        let ApproverKind::Role { role } = kind else {
            return Ok(Err(format!("{} is not a role level", kind)));
        };
        Ok(self
            .roles
            .find_active_holder(*role)?
            .ok_or_else(|| format!("no active {} holder", role)))
    }

    /// Follows manager links up to `tiers` hops.
    fn walk_managers(&self, employee: &Employee, tiers: usize) -> EngineResult<Hierarchy> {
        let mut visited = HashSet::from([employee.id.clone()]);
        let mut managers = Vec::with_capacity(tiers);
        let mut current = employee.clone();

        for hop in 1..=tiers {
            if hop > self.settings.max_hierarchy_depth {
                return Ok(Hierarchy::stopped(
                    managers,
                    format!(
                        "reporting hierarchy exceeds the maximum depth of {}",
                        self.settings.max_hierarchy_depth
                    ),
                ));
            }

            let Some(manager_id) = current.reporting_manager_id.clone() else {
                return Ok(Hierarchy::stopped(
                    managers,
                    format!("'{}' has no reporting manager", current.id),
                ));
            };

            if !visited.insert(manager_id.clone()) {
                return Err(EngineError::HierarchyCycle {
                    employee_id: manager_id,
                });
            }

            let manager = match self.employees.get(&manager_id) {
                Ok(manager) => manager,
                Err(EngineError::NotFound { .. }) => {
                    return Ok(Hierarchy::stopped(
                        managers,
                        format!("manager '{}' of '{}' not found", manager_id, current.id),
                    ));
                }
                Err(e) => return Err(e),
            };

            managers.push(manager.clone());
            current = manager;
        }

        Ok(Hierarchy {
            managers,
            stop_reason: None,
        })
    }
}

struct Hierarchy {
    managers: Vec<Employee>,
    stop_reason: Option<String>,
}

impl Hierarchy {
    fn stopped(managers: Vec<Employee>, reason: String) -> Self {
        Self {
            managers,
            stop_reason: Some(reason),
        }
    }

    /// The active manager `tier` hops above the applicant.
    fn manager(&self, tier: usize) -> Result<String, String> {
        match self.managers.get(tier - 1) {
            Some(manager) if manager.is_active() => Ok(manager.id.clone()),
            Some(manager) => Err(format!("manager '{}' is not active", manager.id)),
            None => Err(self
                .stop_reason
                .clone()
                .unwrap_or_else(|| format!("no manager at tier {}", tier))),
        }
    }
}
