use tracing::{info, instrument};

use super::Lifecycle;
use crate::bootstrap::publish_bootstrap;
use crate::error::{DeployError, Result};
use crate::provisioner::logging::LoggingOutcome;
use crate::router::QaBinding;
use crate::types::Role;

/// What a successful deploy produced.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub fleet: String,
    pub instances: Vec<String>,
    pub qa_bindings: Vec<QaBinding>,
    /// (instance, address) pairs
    pub elastic_addresses: Vec<(String, String)>,
    pub bootstrap_keys: Vec<String>,
    pub logging: LoggingOutcome,
}

impl Lifecycle {
    /// Stand up a new QA fleet next to the current Active one.
    ///
    /// Fails without side effects if a QA fleet already exists. A failure
    /// after the fleet was created leaves it in QA for inspection or abort.
    #[instrument(skip_all, fields(environment = %self.env.environment))]
    pub async fn deploy(&mut self) -> Result<DeployReport> {
        if let Some(existing) = self.roles.holder(Role::Qa) {
            return Err(DeployError::precondition(format!(
                "there is already a QA fleet in '{}' ({}); confirm or abort it first",
                self.env.environment, existing
            )));
        }

        let bootstrap_keys = publish_bootstrap(self.cloud.artifacts.as_ref(), &self.env).await?;
        let logging = self.logging.ensure_logging_instance(&self.router).await?;

        let balancer = self.router.get_or_create_load_balancer().await?;
        let fleet = self
            .provisioner
            .create_fleet(&balancer, &mut self.roles)
            .await?;

        let elastic_addresses = if self.env.assign_elastic_addresses {
            self.router.assign_elastic_addresses(&fleet).await?
        } else {
            Vec::new()
        };

        let qa_bindings = self.router.link_qa_urls(&fleet).await?;
        self.monitoring.push_config(&fleet).await?;

        info!(fleet = %fleet.name, "deployed to QA");
        Ok(DeployReport {
            instances: fleet.members(),
            fleet: fleet.name,
            qa_bindings,
            elastic_addresses,
            bootstrap_keys,
            logging,
        })
    }
}
