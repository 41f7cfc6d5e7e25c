use tracing::instrument;

use super::Lifecycle;
use crate::bootstrap::publish_bootstrap;
use crate::error::Result;
use crate::provisioner::logging::LoggingOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingReport {
    pub bootstrap_keys: Vec<String>,
    pub outcome: LoggingOutcome,
}

impl Lifecycle {
    /// Publish bootstrap files and make sure the logging instance runs.
    #[instrument(skip_all, fields(environment = %self.env.environment))]
    pub async fn provision_logging(&self) -> Result<LoggingReport> {
        let bootstrap_keys = publish_bootstrap(self.cloud.artifacts.as_ref(), &self.env).await?;
        let outcome = self.logging.ensure_logging_instance(&self.router).await?;
        Ok(LoggingReport {
            bootstrap_keys,
            outcome,
        })
    }
}
