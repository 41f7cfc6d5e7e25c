//! Deploy, confirm and abort for one environment.
//!
//! Roles move strictly QA -> Active -> Inactive -> Old -> deleted. Each
//! operation checks its precondition against the role ledger before touching
//! anything, and re-running an operation after fixing a failure is safe:
//! progress is only ever recorded in the ledger and its tag mirror.

mod abort;
mod confirm;
mod deploy;
mod logging;
mod status;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

pub use abort::AbortReport;
pub use confirm::ConfirmReport;
pub use deploy::DeployReport;
pub use logging::LoggingReport;
pub use status::{EnvironmentStatus, FleetStatus};

use crate::config::EnvironmentConfig;
use crate::error::{DeployError, Result};
use crate::monitoring::MonitoringPusher;
use crate::naming::FleetTags;
use crate::provider::Cloud;
use crate::provisioner::FleetProvisioner;
use crate::provisioner::logging::LoggingProvisioner;
use crate::roles::RoleBook;
use crate::router::TrafficRouter;
use crate::state::{EnvironmentLock, LedgerStore};
use crate::types::Fleet;

/// Everything needed to run lifecycle operations on one environment.
///
/// Holds the environment lock for as long as it lives.
#[derive(Debug)]
pub struct Lifecycle {
    env: Arc<EnvironmentConfig>,
    cloud: Cloud,
    roles: RoleBook,
    provisioner: FleetProvisioner,
    router: TrafficRouter,
    monitoring: MonitoringPusher,
    logging: LoggingProvisioner,
    _lock: EnvironmentLock,
}

impl Lifecycle {
    /// Lock the environment and load its role ledger from `state_dir`.
    pub async fn open(cloud: Cloud, env: Arc<EnvironmentConfig>, state_dir: &Path) -> Result<Self> {
        let lock = EnvironmentLock::acquire(state_dir, &env.project, &env.environment)?;
        debug!(lock = %lock.path().display(), "environment locked");
        let store = LedgerStore::new(state_dir.to_path_buf(), &env.project);
        let tags = FleetTags::new(cloud.scaling.clone(), &env.environment);
        let roles = RoleBook::open(store, tags).await?;

        Ok(Self {
            provisioner: FleetProvisioner::new(cloud.clone(), env.clone()),
            router: TrafficRouter::new(cloud.clone(), env.clone()),
            monitoring: MonitoringPusher::new(cloud.clone(), env.clone()),
            logging: LoggingProvisioner::new(cloud.clone(), env.clone()),
            env,
            cloud,
            roles,
            _lock: lock,
        })
    }

    pub fn environment(&self) -> &EnvironmentConfig {
        &self.env
    }

    pub fn roles(&self) -> &RoleBook {
        &self.roles
    }

    /// Remove a fleet's monitoring config during teardown.
    ///
    /// A failed config check has already been remediated (this
    /// environment's host files removed and the daemon restarted), so
    /// teardown carries on after logging it.
    async fn remove_monitoring(&self, fleet: &Fleet) -> Result<()> {
        match self.monitoring.remove_config(fleet).await {
            Err(DeployError::ConfigCheck { host, detail }) => {
                warn!(fleet = %fleet.name, %host, %detail, "monitoring config check failed during teardown");
                Ok(())
            }
            other => other,
        }
    }
}
