//! Role ownership per environment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::types::Role;

/// Current ledger format version
pub const LEDGER_VERSION: u32 = 1;

/// Which fleet holds which role, for every environment of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleLedger {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentRoles>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRoles {
    #[serde(default)]
    pub roles: BTreeMap<Role, RoleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub fleet: String,
    pub assigned_at: DateTime<Utc>,
}

impl RoleLedger {
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION,
            updated_at: Utc::now(),
            environments: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != LEDGER_VERSION {
            anyhow::bail!("Unsupported ledger version: {}", self.version);
        }
        for (environment, roles) in &self.environments {
            let mut seen = BTreeMap::new();
            for (role, entry) in &roles.roles {
                if let Some(other) = seen.insert(entry.fleet.as_str(), role) {
                    anyhow::bail!(
                        "Fleet {} holds both {} and {} in '{}'",
                        entry.fleet,
                        other,
                        role,
                        environment
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether the environment has ever been recorded.
    pub fn knows(&self, environment: &str) -> bool {
        self.environments.contains_key(environment)
    }

    /// Record the environment without any role holders.
    pub fn register(&mut self, environment: &str) {
        self.environments.entry(environment.to_string()).or_default();
    }

    pub fn holder(&self, environment: &str, role: Role) -> Option<&str> {
        self.environments
            .get(environment)
            .and_then(|env| env.roles.get(&role))
            .map(|entry| entry.fleet.as_str())
    }

    pub fn role_of(&self, environment: &str, fleet: &str) -> Option<Role> {
        self.environments.get(environment).and_then(|env| {
            env.roles
                .iter()
                .find(|(_, entry)| entry.fleet == fleet)
                .map(|(role, _)| *role)
        })
    }

    pub fn roles(&self, environment: &str) -> Vec<(Role, RoleEntry)> {
        self.environments
            .get(environment)
            .map(|env| {
                env.roles
                    .iter()
                    .map(|(role, entry)| (*role, entry.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Give `role` to `fleet`, moving the fleet off any role it held.
    ///
    /// Fails if another fleet already holds `role`.
    pub fn assign(&mut self, environment: &str, role: Role, fleet: &str) -> Result<()> {
        if let Some(holder) = self.holder(environment, role)
            && holder != fleet
        {
            return Err(DeployError::integrity(format!(
                "cannot give {} in '{}' to {}: already held by {}",
                role, environment, fleet, holder
            )));
        }
        let now = Utc::now();
        let env = self.environments.entry(environment.to_string()).or_default();
        env.roles.retain(|_, entry| entry.fleet != fleet);
        env.roles.insert(
            role,
            RoleEntry {
                fleet: fleet.to_string(),
                assigned_at: now,
            },
        );
        self.updated_at = now;
        Ok(())
    }

    /// Drop the holder of `role`, returning its fleet name.
    pub fn release(&mut self, environment: &str, role: Role) -> Option<String> {
        let removed = self
            .environments
            .get_mut(environment)
            .and_then(|env| env.roles.remove(&role))
            .map(|entry| entry.fleet);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }
}

impl Default for RoleLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_moves_fleet_between_roles() {
        let mut ledger = RoleLedger::new();
        ledger.assign("stage", Role::Qa, "asg-1").unwrap();
        ledger.assign("stage", Role::Active, "asg-1").unwrap();

        assert_eq!(ledger.holder("stage", Role::Active), Some("asg-1"));
        assert_eq!(ledger.holder("stage", Role::Qa), None);
        assert_eq!(ledger.role_of("stage", "asg-1"), Some(Role::Active));
    }

    #[test]
    fn a_role_has_a_single_owner() {
        let mut ledger = RoleLedger::new();
        ledger.assign("stage", Role::Active, "asg-1").unwrap();
        let err = ledger.assign("stage", Role::Active, "asg-2").unwrap_err();
        assert!(matches!(err, DeployError::Integrity(_)));
        assert_eq!(ledger.holder("stage", Role::Active), Some("asg-1"));
    }

    #[test]
    fn environments_are_independent() {
        let mut ledger = RoleLedger::new();
        ledger.assign("stage", Role::Active, "asg-1").unwrap();
        ledger.assign("live", Role::Active, "asg-2").unwrap();
        assert_eq!(ledger.release("stage", Role::Active).as_deref(), Some("asg-1"));
        assert_eq!(ledger.holder("live", Role::Active), Some("asg-2"));
        assert!(ledger.roles("stage").is_empty());
    }

    #[test]
    fn validate_rejects_fleet_with_two_roles() {
        let mut ledger = RoleLedger::new();
        ledger.assign("stage", Role::Active, "asg-1").unwrap();
        let entry = ledger.environments["stage"].roles[&Role::Active].clone();
        ledger
            .environments
            .get_mut("stage")
            .unwrap()
            .roles
            .insert(Role::Old, entry);
        assert!(ledger.validate().is_err());
    }
}
