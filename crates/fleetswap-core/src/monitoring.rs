//! Host definitions on the monitoring master.
//!
//! One file per fleet member is rendered from the configured template. Every
//! change is followed by a config check; a failing check removes this
//! environment's files before the daemon is restarted, so a bad host
//! definition never keeps monitoring down.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::config::{EnvironmentConfig, MonitoringConfig};
use crate::error::{DeployError, Result};
use crate::naming::ResourceNames;
use crate::provider::Cloud;
use crate::template;
use crate::types::Fleet;
use crate::wait::{self, WaitPolicy};

#[derive(Debug, Clone)]
pub struct MonitoringPusher {
    cloud: Cloud,
    env: Arc<EnvironmentConfig>,
    names: ResourceNames,
    policy: WaitPolicy,
}

impl MonitoringPusher {
    pub fn new(cloud: Cloud, env: Arc<EnvironmentConfig>) -> Self {
        let names = ResourceNames::new(&env.project, &env.environment);
        let policy = WaitPolicy::new(env.poll_interval(), env.poll_timeout());
        Self {
            cloud,
            env,
            names,
            policy,
        }
    }

    fn settings(&self) -> Option<&MonitoringConfig> {
        let settings = self.env.monitoring.as_ref();
        if settings.is_none() {
            debug!("monitoring not configured, skipping");
        }
        settings
    }

    /// Upload one host definition per member, then reload.
    pub async fn push_config(&self, fleet: &Fleet) -> Result<()> {
        let Some(settings) = self.settings() else {
            return Ok(());
        };
        let template_path = self.env.resolve_path(&settings.template);
        let members = fleet.members();

        info!(fleet = %fleet.name, count = members.len(), "waiting on all instances to get an address");
        let compute = self.cloud.compute.as_ref();
        let policy = self.policy;
        let instances = try_join_all(
            members
                .iter()
                .map(|id| wait::instance_has_address(compute, policy, id)),
        )
        .await?;

        for instance in &instances {
            let address = instance.public_address().unwrap_or_default().to_string();
            let mut vars = BTreeMap::new();
            vars.insert("group_name".to_string(), settings.group_name.clone());
            vars.insert(
                "host_name".to_string(),
                self.names.monitoring_host(&instance.id),
            );
            vars.insert("alias".to_string(), address.clone());
            vars.insert("address".to_string(), address);
            let rendered = template::render_file(&template_path, &vars)?;
            let destination = self
                .names
                .monitoring_file(&settings.config_dir, &instance.id);
            info!(instance = %instance.id, %destination, "pushing monitoring config");
            self.cloud
                .remote
                .upload(&settings.master_host, &destination, &rendered)
                .await?;
        }
        self.reload(settings).await
    }

    /// Delete the host definitions of every member, then reload.
    pub async fn remove_config(&self, fleet: &Fleet) -> Result<()> {
        let Some(settings) = self.settings() else {
            return Ok(());
        };
        info!(fleet = %fleet.name, "removing monitoring config");
        for id in fleet.members() {
            let path = self.names.monitoring_file(&settings.config_dir, &id);
            self.cloud
                .remote
                .remove(&settings.master_host, &path)
                .await?;
        }
        self.reload(settings).await
    }

    /// Check the config and restart the daemon, remediating a failed check.
    async fn reload(&self, settings: &MonitoringConfig) -> Result<()> {
        let host = settings.master_host.as_str();
        let check = self.cloud.remote.run(host, &settings.check_command).await?;
        if check.success() {
            self.restart(settings).await?;
            return Ok(());
        }

        let detail = failure_detail(&check.stderr, &check.stdout, check.exit_code);
        warn!(host, %detail, "monitoring config check failed, removing this environment's config");
        let glob = self.names.monitoring_glob(&settings.config_dir);
        self.cloud.remote.remove(host, &glob).await?;

        let recheck = self.cloud.remote.run(host, &settings.check_command).await?;
        if recheck.success() {
            self.restart(settings).await?;
            return Err(DeployError::ConfigCheck {
                host: host.to_string(),
                detail: format!("{detail}; removed {glob} and restarted"),
            });
        }
        Err(DeployError::ConfigCheck {
            host: host.to_string(),
            detail: format!(
                "{detail}; still failing after removing {glob} ({}), daemon not restarted",
                failure_detail(&recheck.stderr, &recheck.stdout, recheck.exit_code)
            ),
        })
    }

    async fn restart(&self, settings: &MonitoringConfig) -> Result<()> {
        let host = settings.master_host.as_str();
        let output = self.cloud.remote.run(host, &settings.restart_command).await?;
        if !output.success() {
            return Err(DeployError::ConfigCheck {
                host: host.to_string(),
                detail: format!(
                    "restart failed: {}",
                    failure_detail(&output.stderr, &output.stdout, output.exit_code)
                ),
            });
        }
        info!(host, "monitoring restarted");
        Ok(())
    }
}

fn failure_detail(stderr: &str, stdout: &str, exit_code: i32) -> String {
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    match text.trim() {
        "" => format!("exit code {exit_code}"),
        trimmed => format!("exit code {exit_code}: {trimmed}"),
    }
}
