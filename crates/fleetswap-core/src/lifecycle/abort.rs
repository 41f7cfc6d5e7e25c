use tracing::{info, instrument};

use super::Lifecycle;
use crate::error::{DeployError, Result};
use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortReport {
    /// The QA fleet that was torn down, if one was still recorded
    pub fleet: Option<String>,
    /// Every fleet deleted along the way, in order
    pub deleted: Vec<String>,
}

impl Lifecycle {
    /// Tear down the QA fleet. Active and Inactive fleets are untouched.
    ///
    /// A fleet an earlier run left in Old is already out of service with
    /// only its deletion outstanding; it is deleted first. When QA is empty
    /// but Old is not (an abort interrupted after the hand-over), finishing
    /// that deletion is all there is to do.
    #[instrument(skip_all, fields(environment = %self.env.environment))]
    pub async fn abort(&mut self) -> Result<AbortReport> {
        let qa = self.roles.fleet(Role::Qa).await?;
        if qa.is_none() && self.roles.holder(Role::Old).is_none() {
            return Err(DeployError::precondition(format!(
                "there is no QA fleet in '{}' to abort",
                self.env.environment
            )));
        }

        let mut deleted = Vec::new();
        if let Some(old) = self.roles.fleet(Role::Old).await? {
            info!(fleet = %old.name, "finishing deletion of Old fleet");
            self.provisioner.delete_fleet(&old, &mut self.roles).await?;
            deleted.push(old.name);
        }

        let Some(qa) = qa else {
            return Ok(AbortReport {
                fleet: None,
                deleted,
            });
        };

        self.remove_monitoring(&qa).await?;
        self.router.unlink_qa_urls(&qa).await?;
        self.router.detach(&qa).await?;

        self.roles.transition(Role::Qa, Role::Old).await?;
        self.provisioner.delete_fleet(&qa, &mut self.roles).await?;
        deleted.push(qa.name.clone());

        info!(fleet = %qa.name, "QA deploy aborted");
        Ok(AbortReport {
            fleet: Some(qa.name),
            deleted,
        })
    }
}
