//! The per-project logging instance and its persistent volume.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{EnvironmentConfig, LoggingConfig};
use crate::error::{DeployError, Result};
use crate::provider::{Cloud, InstanceInfo, RunInstanceSpec, VolumeInfo, VolumeSpec};
use crate::router::TrafficRouter;
use crate::template;
use crate::types::NAME_TAG;
use crate::wait::{self, WaitPolicy};

#[derive(Debug, Clone, PartialEq)]
pub enum LoggingOutcome {
    /// No `[logging]` section is configured
    Disabled,
    AlreadyRunning { instance: String },
    Provisioned { instance: String, volume: String },
}

#[derive(Debug, Clone)]
pub struct LoggingProvisioner {
    cloud: Cloud,
    env: Arc<EnvironmentConfig>,
    policy: WaitPolicy,
}

impl LoggingProvisioner {
    pub fn new(cloud: Cloud, env: Arc<EnvironmentConfig>) -> Self {
        let policy = WaitPolicy::new(env.poll_interval(), env.poll_timeout());
        Self { cloud, env, policy }
    }

    /// Make sure a logging instance is running, launching one if needed.
    #[instrument(skip_all, fields(project = %self.env.project))]
    pub async fn ensure_logging_instance(&self, router: &TrafficRouter) -> Result<LoggingOutcome> {
        let Some(logging) = &self.env.logging else {
            info!("no logging instance configured");
            return Ok(LoggingOutcome::Disabled);
        };

        let name = self.env.logger_name();
        let running = self.cloud.compute.find_running_by_name(&name).await?;
        if let Some(existing) = running.first() {
            info!(instance = %existing.id, "logging instance already running");
            return Ok(LoggingOutcome::AlreadyRunning {
                instance: existing.id.clone(),
            });
        }

        info!("deploying logging instance");
        let user_data = match &self.env.user_data.logging {
            Some(path) => template::render_file(
                &self.env.resolve_path(path),
                &self.env.template_variables(),
            )?,
            None => String::new(),
        };
        let launched = self
            .cloud
            .compute
            .run_instance(&RunInstanceSpec {
                image_id: logging.ami_id.clone(),
                key_name: self.env.key_name.clone(),
                security_groups: self.env.security_groups.clone(),
                user_data,
                instance_type: logging
                    .instance_type
                    .clone()
                    .unwrap_or_else(|| self.env.instance_type.clone()),
                instance_profile: self.env.instance_profile.clone(),
            })
            .await?;

        info!(instance = %launched.id, "waiting on logging instance to spin up");
        let instance =
            wait::instance_running(self.cloud.compute.as_ref(), self.policy, &launched.id).await?;
        self.cloud
            .compute
            .tag_instance(&instance.id, NAME_TAG, &name)
            .await?;

        let volume = self.logging_volume(logging, &instance).await?;
        info!(volume = %volume.id, "waiting on volume to be available");
        wait::volume_available(self.cloud.compute.as_ref(), self.policy, &volume.id).await?;
        info!(volume = %volume.id, device = %logging.device, "attaching volume");
        self.cloud
            .compute
            .attach_volume(&volume.id, &instance.id, &logging.device)
            .await?;

        let addressed =
            wait::instance_has_address(self.cloud.compute.as_ref(), self.policy, &instance.id)
                .await?;
        let target = addressed.public_address().ok_or_else(|| {
            DeployError::integrity(format!("{} lost its public address", instance.id))
        })?;
        router.bind_names(&logging.urls, target).await?;
        info!(instance = %instance.id, "finished provisioning logging instance");

        Ok(LoggingOutcome::Provisioned {
            instance: instance.id,
            volume: volume.id,
        })
    }

    /// Reuse the named volume (detaching it if needed) or create it.
    async fn logging_volume(
        &self,
        logging: &LoggingConfig,
        instance: &InstanceInfo,
    ) -> Result<VolumeInfo> {
        let existing = self
            .cloud
            .compute
            .find_volumes_by_name(&logging.volume_name)
            .await?;
        if let Some(volume) = existing.into_iter().next() {
            if let Some(attached) = &volume.attached_to {
                info!(volume = %volume.id, instance = %attached, "detaching logging volume");
                self.cloud.compute.detach_volume(&volume.id).await?;
            }
            return Ok(volume);
        }

        let zone = instance
            .zone
            .clone()
            .or_else(|| self.env.zones.first().cloned())
            .ok_or_else(|| {
                DeployError::Config("no availability zone known for the logging volume".into())
            })?;
        info!(zone = %zone, size_gb = logging.volume_size_gb, "creating logging volume");
        Ok(self
            .cloud
            .compute
            .create_volume(&VolumeSpec {
                name: logging.volume_name.clone(),
                size_gb: logging.volume_size_gb,
                volume_type: logging.volume_type.clone(),
                zone,
            })
            .await?)
    }
}
