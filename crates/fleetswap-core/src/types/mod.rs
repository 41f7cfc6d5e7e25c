//! Shared domain types for fleets and their lifecycle roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::provider::{ScalingGroup, Tag};

/// Tag key carrying the lifecycle role of a fleet.
pub const ROLE_TAG: &str = "type";
/// Tag key carrying the environment a fleet belongs to.
pub const ENVIRONMENT_TAG: &str = "env";
/// Tag key propagated to instances for console visibility.
pub const NAME_TAG: &str = "Name";

/// Scaling process suspended until a candidate fleet is validated.
pub const ADD_TO_LOAD_BALANCER: &str = "AddToLoadBalancer";

/// Lifecycle role of a fleet within one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Candidate, reachable only through the QA names
    #[serde(rename = "QA")]
    Qa,
    /// Serving production traffic
    Active,
    /// Just replaced, draining
    Inactive,
    /// Marked for deletion
    Old,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Qa, Role::Active, Role::Inactive, Role::Old];

    /// Value written to the role tag.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Role::Qa => "QA",
            Role::Active => "Active",
            Role::Inactive => "Inactive",
            Role::Old => "Old",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QA" => Ok(Role::Qa),
            "Active" => Ok(Role::Active),
            "Inactive" => Ok(Role::Inactive),
            "Old" => Ok(Role::Old),
            other => Err(format!("Unknown fleet role: {other}")),
        }
    }
}

/// A scaling group as seen by the deploy logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub name: String,
    pub environment: Option<String>,
    /// Role according to the tag mirror
    pub tagged_role: Option<Role>,
    pub launch_template: String,
    pub load_balancers: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub instances: Vec<String>,
    pub suspended_processes: Vec<String>,
}

impl Fleet {
    /// Member instance ids ordered by id.
    ///
    /// QA slot N is bound to the N-th id of this ordering, so the binding
    /// does not depend on the order the provider lists members in.
    pub fn members(&self) -> Vec<String> {
        let mut ids = self.instances.clone();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn tag_value(group: &ScalingGroup, key: &str) -> Option<String> {
        group
            .tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.clone())
    }
}

impl From<ScalingGroup> for Fleet {
    fn from(group: ScalingGroup) -> Self {
        let environment = Fleet::tag_value(&group, ENVIRONMENT_TAG);
        let tagged_role = Fleet::tag_value(&group, ROLE_TAG).and_then(|v| v.parse().ok());
        Fleet {
            name: group.name,
            environment,
            tagged_role,
            launch_template: group.launch_template,
            load_balancers: group.load_balancers,
            min_size: group.min_size,
            max_size: group.max_size,
            desired_capacity: group.desired_capacity,
            instances: group.instances,
            suspended_processes: group.suspended_processes,
        }
    }
}

/// Build a tag for a scaling group.
pub fn tag(key: &str, value: &str, propagate_at_launch: bool) -> Tag {
    Tag {
        key: key.to_string(),
        value: value.to_string(),
        propagate_at_launch,
    }
}
