use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Lifecycle;
use crate::error::Result;
use crate::types::Role;

/// Role map of one environment.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentStatus {
    pub environment: String,
    pub load_balancer: String,
    pub fleets: Vec<FleetStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetStatus {
    pub role: Role,
    pub fleet: String,
    pub assigned_at: DateTime<Utc>,
    /// False when the recorded fleet no longer exists
    pub exists: bool,
    pub instances: Vec<String>,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub suspended_processes: Vec<String>,
}

impl Lifecycle {
    pub async fn status(&self) -> Result<EnvironmentStatus> {
        let mut fleets = Vec::new();
        for (role, entry) in self.roles.entries() {
            let described = self.roles.tags().describe(&entry.fleet).await?;
            fleets.push(match described {
                Some(fleet) => FleetStatus {
                    role,
                    instances: fleet.members(),
                    fleet: fleet.name,
                    assigned_at: entry.assigned_at,
                    exists: true,
                    desired_capacity: fleet.desired_capacity,
                    min_size: fleet.min_size,
                    max_size: fleet.max_size,
                    suspended_processes: fleet.suspended_processes,
                },
                None => FleetStatus {
                    role,
                    fleet: entry.fleet,
                    assigned_at: entry.assigned_at,
                    exists: false,
                    instances: Vec::new(),
                    desired_capacity: 0,
                    min_size: 0,
                    max_size: 0,
                    suspended_processes: Vec::new(),
                },
            });
        }
        fleets.sort_by_key(|f| f.role);
        Ok(EnvironmentStatus {
            environment: self.env.environment.clone(),
            load_balancer: self.env.load_balancer_name.clone(),
            fleets,
        })
    }
}
