//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading leave policy
//! configurations from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::policy::PolicyRuleEngine;

use super::types::{EngineConfig, EngineSettings, RegionPolicy};

const MAX_STALENESS_DAYS: i64 = 3650;
const MAX_LEASE_MINUTES: i64 = 1440;
const MAX_BACKOFF_SECONDS: i64 = 86_400;

/// Loads and provides access to leave policy configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory,
/// validates them, and builds the [`PolicyRuleEngine`] the other components
/// share.
///
/// # Directory Structure
///
/// ```text
/// config/leave_policy/
/// ├── engine.yaml        # Approval, comp-off, batch and notification settings
/// └── regions/
///     ├── india.yaml     # One regional policy per file
///     └── us.yaml
/// ```
///
/// # Example
///
/// ```no_run
/// use leave_engine::config::ConfigLoader;
/// use leave_engine::models::{LeaveType, Region};
///
/// let loader = ConfigLoader::load("./config/leave_policy")?;
/// let rule = loader.policies().get_policy(Region::India, LeaveType::Privilege)?;
/// println!("PL approval levels: {}", rule.approval.len());
/// # Ok::<(), leave_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
    policies: PolicyRuleEngine,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - `engine.yaml` or the `regions` directory is missing (`ConfigNotFound`)
    /// - Any file contains invalid YAML (`ConfigParseError`)
    /// - The policies are semantically invalid (`InvalidPolicy`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<EngineSettings>(&path.join("engine.yaml"))?;
        let regions = Self::load_regions(&path.join("regions"))?;

        Self::from_config(EngineConfig { settings, regions })
    }

    /// Builds a loader from an in-memory configuration, applying the same
    /// validation as [`ConfigLoader::load`].
    pub fn from_config(config: EngineConfig) -> EngineResult<Self> {
        let policies = PolicyRuleEngine::new(config.regions.clone())?;
        validate_settings(&config.settings)?;
        Ok(Self { config, policies })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every regional policy file, in file name order.
    fn load_regions(regions_dir: &Path) -> EngineResult<Vec<RegionPolicy>> {
        let regions_dir_str = regions_dir.display().to_string();

        let entries = fs::read_dir(regions_dir).map_err(|_| EngineError::ConfigNotFound {
            path: regions_dir_str.clone(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: regions_dir_str.clone(),
            })?;
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no region policy files found)", regions_dir_str),
            });
        }

        paths
            .iter()
            .map(|path| Self::load_yaml::<RegionPolicy>(path))
            .collect()
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.config.settings
    }

    /// Returns the validated policy engine.
    pub fn policies(&self) -> &PolicyRuleEngine {
        &self.policies
    }

    /// Splits the loader into settings and policy engine.
    pub fn into_parts(self) -> (EngineSettings, PolicyRuleEngine) {
        (self.config.settings, self.policies)
    }
}

fn validate_settings(settings: &EngineSettings) -> EngineResult<()> {
    let invalid = |message: &str| {
        Err(EngineError::InvalidPolicy {
            message: message.to_string(),
        })
    };

    let comp_off = &settings.comp_off;
    if comp_off.hours_per_day <= rust_decimal::Decimal::ZERO {
        return invalid("comp_off.hours_per_day must be positive");
    }
    if comp_off.half_day_hours <= rust_decimal::Decimal::ZERO
        || comp_off.half_day_hours >= comp_off.hours_per_day
    {
        return invalid("comp_off.half_day_hours must be positive and below hours_per_day");
    }
    if !(0..=MAX_STALENESS_DAYS).contains(&comp_off.staleness_days) {
        return invalid("comp_off.staleness_days must be between 0 and 3650");
    }
    if comp_off.min_hours <= rust_decimal::Decimal::ZERO {
        return invalid("comp_off.min_hours must be positive");
    }
    if comp_off.rate <= rust_decimal::Decimal::ZERO {
        return invalid("comp_off.rate must be positive");
    }
    if settings.approval.max_hierarchy_depth == 0 {
        return invalid("approval.max_hierarchy_depth must be at least 1");
    }
    if settings.approval.max_store_attempts == 0 {
        return invalid("approval.max_store_attempts must be at least 1");
    }
    if !(1..=MAX_LEASE_MINUTES).contains(&settings.batch.lease_minutes) {
        return invalid("batch.lease_minutes must be between 1 and 1440");
    }
    if !(0..=MAX_BACKOFF_SECONDS).contains(&settings.notifications.backoff_seconds) {
        return invalid("notifications.backoff_seconds must be between 0 and 86400");
    }
    if settings.notifications.retry_capacity == 0 {
        return invalid("notifications.retry_capacity must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaveType, Region, Role};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn config_path() -> &'static str {
        "./config/leave_policy"
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_load_valid_configuration() {
        let result = ConfigLoader::load(config_path());
        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());

        let loader = result.unwrap();
        assert_eq!(loader.config().regions.len(), 2);
        assert_eq!(loader.settings().approval.max_store_attempts, 3);
    }

    #[test]
    fn test_india_privilege_leave_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let rule = loader
            .policies()
            .get_policy(Region::India, LeaveType::Privilege)
            .unwrap();

        assert_eq!(rule.entitlement.monthly_rate(), Some(dec("1.25")));
        assert_eq!(rule.carry_forward.cap(), Some(dec("15")));
        assert!(rule.role_overrides.contains_key(&Role::Vp));
    }

    #[test]
    fn test_us_pto_vp_carry_forward_is_zero() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let cap = loader
            .policies()
            .carry_forward_cap(Region::Us, LeaveType::Pto, Role::Vp)
            .unwrap();
        assert_eq!(cap, Some(Decimal::ZERO));
    }

    #[test]
    fn test_comp_off_settings_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let comp_off = &loader.settings().comp_off;
        assert_eq!(comp_off.min_hours, dec("5"));
        assert_eq!(comp_off.staleness_days, 30);
    }

    #[test]
    fn test_load_missing_directory_returns_error() {
        let result = ConfigLoader::load("/nonexistent/path");

        match result {
            Err(EngineError::ConfigNotFound { path }) => {
                assert!(path.contains("engine.yaml"));
            }
            _ => panic!("Expected ConfigNotFound error"),
        }
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let mut config = loader.config().clone();
        config.settings.comp_off.half_day_hours = dec("9");

        match ConfigLoader::from_config(config) {
            Err(EngineError::InvalidPolicy { message }) => {
                assert!(message.contains("half_day_hours"));
            }
            _ => panic!("Expected InvalidPolicy error"),
        }
    }

    fn rejection_message(edit: impl FnOnce(&mut EngineSettings)) -> String {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let mut config = loader.config().clone();
        edit(&mut config.settings);

        match ConfigLoader::from_config(config) {
            Err(EngineError::InvalidPolicy { message }) => message,
            other => panic!("Expected InvalidPolicy error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_out_of_range_staleness_rejected() {
        let message = rejection_message(|s| s.comp_off.staleness_days = 1_000_000_000);
        assert!(message.contains("staleness_days"));

        let message = rejection_message(|s| s.comp_off.staleness_days = -1);
        assert!(message.contains("staleness_days"));
    }

    #[test]
    fn test_non_positive_comp_off_rate_rejected() {
        assert!(rejection_message(|s| s.comp_off.rate = Decimal::ZERO).contains("rate"));
        assert!(rejection_message(|s| s.comp_off.rate = dec("-1")).contains("rate"));
    }

    #[test]
    fn test_non_positive_min_hours_rejected() {
        let message = rejection_message(|s| s.comp_off.min_hours = Decimal::ZERO);
        assert!(message.contains("min_hours"));
    }

    #[test]
    fn test_out_of_range_lease_rejected() {
        let message = rejection_message(|s| s.batch.lease_minutes = i64::MAX);
        assert!(message.contains("lease_minutes"));

        let message = rejection_message(|s| s.batch.lease_minutes = 0);
        assert!(message.contains("lease_minutes"));
    }

    #[test]
    fn test_out_of_range_backoff_rejected() {
        let message = rejection_message(|s| s.notifications.backoff_seconds = -60);
        assert!(message.contains("backoff_seconds"));

        let message = rejection_message(|s| s.notifications.backoff_seconds = i64::MAX);
        assert!(message.contains("backoff_seconds"));
    }
}
