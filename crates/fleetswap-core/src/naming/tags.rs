//! Role and environment tags on scaling groups.

use std::sync::Arc;

use tracing::debug;

use crate::error::{DeployError, Result};
use crate::provider::ScalingApi;
use crate::types::{Fleet, ROLE_TAG, Role, tag};

/// Tag-level view of the fleets of one environment.
#[derive(Clone)]
pub struct FleetTags {
    scaling: Arc<dyn ScalingApi>,
    environment: String,
}

impl FleetTags {
    pub fn new(scaling: Arc<dyn ScalingApi>, environment: impl Into<String>) -> Self {
        Self {
            scaling,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Create or overwrite one tag on a scaling group.
    pub async fn tag(&self, group: &str, key: &str, value: &str, propagate: bool) -> Result<()> {
        debug!(fleet = group, key, value, "tagging scaling group");
        self.scaling
            .create_or_update_tags(group, &[tag(key, value, propagate)])
            .await?;
        Ok(())
    }

    pub async fn tag_role(&self, group: &str, role: Role) -> Result<()> {
        self.tag(group, ROLE_TAG, role.as_tag(), false).await
    }

    /// Every fleet tagged with this environment.
    pub async fn find_all_in_environment(&self) -> Result<Vec<Fleet>> {
        let groups = self.scaling.describe_groups().await?;
        let mut fleets: Vec<Fleet> = groups
            .into_iter()
            .map(Fleet::from)
            .filter(|fleet| fleet.environment.as_deref() == Some(self.environment.as_str()))
            .collect();
        fleets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fleets)
    }

    /// The single fleet tagged with `role`, if any.
    pub async fn find_by_role(&self, role: Role) -> Result<Option<Fleet>> {
        let mut matches: Vec<Fleet> = self
            .find_all_in_environment()
            .await?
            .into_iter()
            .filter(|fleet| fleet.tagged_role == Some(role))
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(DeployError::integrity(format!(
                "{} fleets in '{}' are tagged {}: {}",
                matches.len(),
                self.environment,
                role,
                matches
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Fresh view of one fleet by name.
    pub async fn describe(&self, name: &str) -> Result<Option<Fleet>> {
        Ok(self.scaling.describe_group(name).await?.map(Fleet::from))
    }
}

impl std::fmt::Debug for FleetTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetTags")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
