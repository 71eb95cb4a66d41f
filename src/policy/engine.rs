//! Regional policy lookup with role overrides.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::{
    CarryForwardRule, DocumentationRule, EligibilityRule, Entitlement, PolicyRule, RegionPolicy,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{ApproverKind, LeaveType, Region, Role};

/// A policy rule with any role override already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    /// The region the rule came from.
    pub region: Region,
    /// The leave type.
    pub leave_type: LeaveType,
    /// The role the rule was resolved for.
    pub role: Role,
    /// Effective entitlement.
    pub entitlement: Entitlement,
    /// Effective carry-forward rule.
    pub carry_forward: CarryForwardRule,
    /// Eligibility predicates.
    pub eligibility: EligibilityRule,
    /// Approver sequence.
    pub approval: Vec<ApproverKind>,
    /// One request per calendar year.
    pub once_per_year: bool,
    /// Blocks other leave while active.
    pub blocking: bool,
    /// Documentation requirement.
    pub documentation: Option<DocumentationRule>,
    /// True if a role override changed the entitlement or carry-forward.
    pub override_applied: bool,
}

/// Declarative per-region leave policy.
///
/// Immutable after construction; share it behind an `Arc` across any number
/// of readers.
///
/// Resolution order for role-sensitive fields: exact role override, then
/// the regional default. Unknown `(region, leave type)` pairs are an error.
#[derive(Debug, Clone)]
pub struct PolicyRuleEngine {
    regions: HashMap<Region, RegionPolicy>,
}

impl PolicyRuleEngine {
    /// Builds the engine, validating every regional policy.
    ///
    /// # Errors
    ///
    /// `InvalidPolicy` if a region appears twice, a join-day threshold is
    /// outside 1..=28, an approval sequence is empty, or any rate, grant or
    /// cap is negative.
    pub fn new(regions: Vec<RegionPolicy>) -> EngineResult<Self> {
        let mut by_region = HashMap::with_capacity(regions.len());

        for policy in regions {
            validate_region(&policy)?;
            let region = policy.region;
            if by_region.insert(region, policy).is_some() {
                return Err(EngineError::InvalidPolicy {
                    message: format!("region {} is defined more than once", region),
                });
            }
        }

        Ok(Self { regions: by_region })
    }

    /// Returns the regional policy.
    pub fn region(&self, region: Region) -> EngineResult<&RegionPolicy> {
        self.regions
            .get(&region)
            .ok_or_else(|| EngineError::not_found("region policy", region))
    }

    /// Returns the regional default rule for a leave type.
    pub fn get_policy(&self, region: Region, leave_type: LeaveType) -> EngineResult<&PolicyRule> {
        self.regions
            .get(&region)
            .and_then(|policy| policy.leave_types.get(&leave_type))
            .ok_or(EngineError::PolicyNotFound { region, leave_type })
    }

    /// Returns true if the region offers the leave type.
    pub fn offers(&self, region: Region, leave_type: LeaveType) -> bool {
        self.get_policy(region, leave_type).is_ok()
    }

    /// Resolves the rule for a role, layering the role override (if any) on
    /// the regional default.
    pub fn resolve(
        &self,
        region: Region,
        leave_type: LeaveType,
        role: Role,
    ) -> EngineResult<ResolvedPolicy> {
        let rule = self.get_policy(region, leave_type)?;
        let role_override = rule.role_overrides.get(&role);

        let entitlement = role_override
            .and_then(|o| o.entitlement)
            .unwrap_or(rule.entitlement);
        let carry_forward = role_override
            .and_then(|o| o.carry_forward)
            .unwrap_or(rule.carry_forward);

        Ok(ResolvedPolicy {
            region,
            leave_type,
            role,
            entitlement,
            carry_forward,
            eligibility: rule.eligibility.clone(),
            approval: rule.approval.clone(),
            once_per_year: rule.once_per_year,
            blocking: rule.blocking,
            documentation: rule.documentation.clone(),
            override_applied: role_override
                .is_some_and(|o| o.entitlement.is_some() || o.carry_forward.is_some()),
        })
    }

    /// Leave types offered in a region, in stable order.
    pub fn leave_types(&self, region: Region) -> EngineResult<Vec<LeaveType>> {
        Ok(self.region(region)?.leave_types.keys().copied().collect())
    }

    /// Returns true if any of the region's leave types accrues monthly.
    pub fn uses_monthly_accrual(&self, region: Region) -> bool {
        self.regions.get(&region).is_some_and(|policy| {
            policy
                .leave_types
                .values()
                .any(|rule| rule.entitlement.monthly_rate().is_some())
        })
    }

    /// The join-day threshold used for pro-rating the joining month.
    pub fn join_day_threshold(&self, region: Region) -> EngineResult<u32> {
        Ok(self.region(region)?.accrual.join_day_threshold)
    }

    /// The carry-forward cap for a role; `None` means uncapped.
    pub fn carry_forward_cap(
        &self,
        region: Region,
        leave_type: LeaveType,
        role: Role,
    ) -> EngineResult<Option<Decimal>> {
        Ok(self.resolve(region, leave_type, role)?.carry_forward.cap())
    }
}

fn validate_region(policy: &RegionPolicy) -> EngineResult<()> {
    let invalid = |message: String| EngineError::InvalidPolicy { message };

    let threshold = policy.accrual.join_day_threshold;
    if !(1..=28).contains(&threshold) {
        return Err(invalid(format!(
            "region {}: join_day_threshold must be between 1 and 28, got {}",
            policy.region, threshold
        )));
    }

    if policy.leave_types.is_empty() {
        return Err(invalid(format!(
            "region {} defines no leave types",
            policy.region
        )));
    }

    for (leave_type, rule) in &policy.leave_types {
        let context = format!("region {} leave type {}", policy.region, leave_type);

        if rule.approval.is_empty() {
            return Err(invalid(format!("{}: approval sequence is empty", context)));
        }
        if rule.approval.len() > u8::MAX as usize {
            return Err(invalid(format!("{}: too many approval levels", context)));
        }

        validate_entitlement(&rule.entitlement, &context)?;
        validate_carry_forward(&rule.carry_forward, &context)?;

        for (role, role_override) in &rule.role_overrides {
            let context = format!("{} override for {}", context, role);
            if let Some(entitlement) = &role_override.entitlement {
                validate_entitlement(entitlement, &context)?;
            }
            if let Some(carry_forward) = &role_override.carry_forward {
                validate_carry_forward(carry_forward, &context)?;
            }
        }
    }

    Ok(())
}

fn validate_entitlement(entitlement: &Entitlement, context: &str) -> EngineResult<()> {
    let amount = match entitlement {
        Entitlement::MonthlyAccrual { monthly_rate } => *monthly_rate,
        Entitlement::FlatAnnual { days } => *days,
        Entitlement::Earned | Entitlement::Unlimited => return Ok(()),
    };
    if amount < Decimal::ZERO {
        return Err(EngineError::InvalidPolicy {
            message: format!("{}: entitlement must not be negative", context),
        });
    }
    Ok(())
}

fn validate_carry_forward(rule: &CarryForwardRule, context: &str) -> EngineResult<()> {
    if let CarryForwardRule::Capped { max_days } = rule {
        if *max_days < Decimal::ZERO {
            return Err(EngineError::InvalidPolicy {
                message: format!("{}: carry-forward cap must not be negative", context),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccrualSettings, RoleOverride};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn pto_rule() -> PolicyRule {
        let mut role_overrides = BTreeMap::new();
        role_overrides.insert(
            Role::Vp,
            RoleOverride {
                entitlement: None,
                carry_forward: Some(CarryForwardRule::Capped {
                    max_days: Decimal::ZERO,
                }),
            },
        );
        PolicyRule {
            entitlement: Entitlement::FlatAnnual { days: dec("15") },
            eligibility: EligibilityRule::default(),
            carry_forward: CarryForwardRule::Capped {
                max_days: dec("5"),
            },
            approval: vec![ApproverKind::ReportingManager],
            once_per_year: false,
            blocking: false,
            documentation: None,
            role_overrides,
        }
    }

    fn us_policy() -> RegionPolicy {
        let mut leave_types = BTreeMap::new();
        leave_types.insert(LeaveType::Pto, pto_rule());
        RegionPolicy {
            region: Region::Us,
            accrual: AccrualSettings::default(),
            leave_types,
        }
    }

    fn india_policy() -> RegionPolicy {
        let mut leave_types = BTreeMap::new();
        leave_types.insert(
            LeaveType::Casual,
            PolicyRule {
                entitlement: Entitlement::MonthlyAccrual {
                    monthly_rate: dec("1"),
                },
                eligibility: EligibilityRule::default(),
                carry_forward: CarryForwardRule::Expire,
                approval: vec![ApproverKind::ReportingManager],
                once_per_year: false,
                blocking: false,
                documentation: None,
                role_overrides: BTreeMap::new(),
            },
        );
        RegionPolicy {
            region: Region::India,
            accrual: AccrualSettings {
                join_day_threshold: 15,
            },
            leave_types,
        }
    }

    fn engine() -> PolicyRuleEngine {
        PolicyRuleEngine::new(vec![us_policy(), india_policy()]).unwrap()
    }

    #[test]
    fn test_role_override_takes_precedence() {
        let resolved = engine()
            .resolve(Region::Us, LeaveType::Pto, Role::Vp)
            .unwrap();
        assert_eq!(resolved.carry_forward.cap(), Some(Decimal::ZERO));
        assert!(resolved.override_applied);
        // Entitlement falls back to the regional default.
        assert_eq!(resolved.entitlement.annual_grant(), Some(dec("15")));
    }

    #[test]
    fn test_regional_default_without_override() {
        let resolved = engine()
            .resolve(Region::Us, LeaveType::Pto, Role::Employee)
            .unwrap();
        assert_eq!(resolved.carry_forward.cap(), Some(dec("5")));
        assert!(!resolved.override_applied);
    }

    #[test]
    fn test_unknown_leave_type_for_region() {
        match engine().get_policy(Region::Us, LeaveType::CompOff) {
            Err(EngineError::PolicyNotFound { region, leave_type }) => {
                assert_eq!(region, Region::Us);
                assert_eq!(leave_type, LeaveType::CompOff);
            }
            _ => panic!("Expected PolicyNotFound error"),
        }
    }

    #[test]
    fn test_uses_monthly_accrual() {
        let engine = engine();
        assert!(engine.uses_monthly_accrual(Region::India));
        assert!(!engine.uses_monthly_accrual(Region::Us));
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let result = PolicyRuleEngine::new(vec![us_policy(), us_policy()]);
        assert!(matches!(result, Err(EngineError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_empty_approval_sequence_rejected() {
        let mut policy = us_policy();
        policy
            .leave_types
            .get_mut(&LeaveType::Pto)
            .unwrap()
            .approval
            .clear();

        match PolicyRuleEngine::new(vec![policy]) {
            Err(EngineError::InvalidPolicy { message }) => {
                assert!(message.contains("approval sequence is empty"));
            }
            _ => panic!("Expected InvalidPolicy error"),
        }
    }

    #[test]
    fn test_negative_override_cap_rejected() {
        let mut policy = us_policy();
        policy
            .leave_types
            .get_mut(&LeaveType::Pto)
            .unwrap()
            .role_overrides
            .insert(
                Role::Manager,
                RoleOverride {
                    entitlement: None,
                    carry_forward: Some(CarryForwardRule::Capped {
                        max_days: dec("-1"),
                    }),
                },
            );

        assert!(matches!(
            PolicyRuleEngine::new(vec![policy]),
            Err(EngineError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut policy = india_policy();
        policy.accrual.join_day_threshold = 31;
        assert!(matches!(
            PolicyRuleEngine::new(vec![policy]),
            Err(EngineError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyRuleEngine>();
    }
}
