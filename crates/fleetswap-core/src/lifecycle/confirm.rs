use std::time::Duration;

use tracing::{info, instrument};

use super::Lifecycle;
use crate::error::{DeployError, Result};
use crate::provider::LoadBalancer;
use crate::types::{ADD_TO_LOAD_BALANCER, Fleet, Role};

/// What a successful confirm changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmReport {
    /// The fleet now serving production traffic
    pub active: String,
    /// The fleet it replaced, if there was one
    pub replaced: Option<String>,
    /// Every fleet deleted along the way, in order
    pub deleted: Vec<String>,
}

impl Lifecycle {
    /// Promote the QA fleet to Active and retire the previous Active fleet.
    ///
    /// Roles only move once the QA fleet is registered, resumed, behind the
    /// production names and in service, so a run that fails before that is
    /// simply repeated. A run that fails while retiring the replaced fleet
    /// leaves it Inactive or Old next to the new Active one; confirming
    /// again without a QA fleet finishes that retirement.
    #[instrument(skip_all, fields(environment = %self.env.environment))]
    pub async fn confirm(&mut self) -> Result<ConfirmReport> {
        let qa = self.roles.fleet(Role::Qa).await?;
        let retiring = self.roles.holder(Role::Active).is_some()
            && (self.roles.holder(Role::Inactive).is_some()
                || self.roles.holder(Role::Old).is_some());
        if qa.is_none() && !retiring {
            return Err(DeployError::precondition(format!(
                "there is no QA fleet in '{}' to confirm",
                self.env.environment
            )));
        }

        let balancer = self.router.get_or_create_load_balancer().await?;
        let mut deleted = Vec::new();

        if let Some(old) = self.roles.fleet(Role::Old).await? {
            info!(fleet = %old.name, "deleting leftover Old fleet");
            self.provisioner.delete_fleet(&old, &mut self.roles).await?;
            deleted.push(old.name);
        }

        let Some(qa) = qa else {
            return self.finish_retirement(&balancer, deleted).await;
        };

        // Next to an Active fleet, an Inactive one is a leftover whose
        // replacement already serves.
        if self.roles.holder(Role::Active).is_some()
            && let Some(inactive) = self.roles.fleet(Role::Inactive).await?
        {
            info!(fleet = %inactive.name, "retiring leftover Inactive fleet");
            self.retire(&balancer, &inactive).await?;
            deleted.push(inactive.name);
        }
        let previous = match self.roles.fleet(Role::Active).await? {
            Some(active) => Some(active),
            None => self.roles.fleet(Role::Inactive).await?,
        };

        self.router.register_instances(&balancer, &qa).await?;
        self.cloud
            .scaling
            .resume_processes(&qa.name, &[ADD_TO_LOAD_BALANCER])
            .await?;
        self.router.link_base_urls(&balancer).await?;
        self.router.unlink_qa_urls(&qa).await?;
        self.router.wait_in_service(&balancer, &qa).await?;

        self.roles.transition(Role::Active, Role::Inactive).await?;
        self.roles.assign(Role::Active, &qa.name).await?;

        let settle = Duration::from_secs(self.env.cutover.settle_seconds);
        if !settle.is_zero() {
            info!(seconds = settle.as_secs(), "letting traffic settle before removing old instances");
            tokio::time::sleep(settle).await;
        }

        let replaced = match previous {
            Some(previous) => {
                self.retire(&balancer, &previous).await?;
                deleted.push(previous.name.clone());
                Some(previous.name)
            }
            None => None,
        };

        info!(active = %qa.name, "confirmed");
        Ok(ConfirmReport {
            active: qa.name,
            replaced,
            deleted,
        })
    }

    /// Complete the teardown an earlier confirm started after its cutover.
    async fn finish_retirement(
        &mut self,
        balancer: &LoadBalancer,
        mut deleted: Vec<String>,
    ) -> Result<ConfirmReport> {
        let replaced = match self.roles.fleet(Role::Inactive).await? {
            Some(inactive) => {
                info!(fleet = %inactive.name, "finishing retirement of replaced fleet");
                self.retire(balancer, &inactive).await?;
                deleted.push(inactive.name.clone());
                Some(inactive.name)
            }
            None => deleted.last().cloned(),
        };
        let active = self.roles.holder(Role::Active).map(str::to_string).ok_or_else(|| {
            DeployError::integrity(format!(
                "no Active fleet recorded in '{}'",
                self.env.environment
            ))
        })?;

        info!(%active, "confirm completed");
        Ok(ConfirmReport {
            active,
            replaced,
            deleted,
        })
    }

    /// Take an Inactive fleet out of service, shrink it and delete it.
    ///
    /// Every step tolerates having run before.
    async fn retire(&mut self, balancer: &LoadBalancer, fleet: &Fleet) -> Result<()> {
        self.remove_monitoring(fleet).await?;
        self.router.deregister_instances(balancer, fleet).await?;

        info!(fleet = %fleet.name, "scaling down old fleet");
        self.provisioner.schedule_scale_down(&fleet.name).await?;

        info!(fleet = %fleet.name, "shutting down old fleet");
        self.roles.transition(Role::Inactive, Role::Old).await?;
        self.provisioner.delete_fleet(fleet, &mut self.roles).await
    }
}
