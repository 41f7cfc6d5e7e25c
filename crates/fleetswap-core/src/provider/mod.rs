//! Narrow interfaces to the cloud services the deploy logic drives.
//!
//! Every collaborator is a trait object so the lifecycle can run against the
//! `aws` command-line backend in production and the in-memory cloud in tests.

pub mod aws_cli;
pub mod memory;
pub mod process;
pub mod ssh;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use types::*;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Scaling groups, launch templates, policies and scheduled actions.
#[async_trait]
pub trait ScalingApi: Send + Sync {
    async fn create_launch_template(&self, spec: &LaunchTemplateSpec) -> ProviderResult<()>;

    async fn delete_launch_template(&self, name: &str) -> ProviderResult<()>;

    async fn create_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()>;

    async fn describe_groups(&self) -> ProviderResult<Vec<ScalingGroup>>;

    async fn describe_group(&self, name: &str) -> ProviderResult<Option<ScalingGroup>>;

    async fn create_or_update_tags(&self, group: &str, tags: &[Tag]) -> ProviderResult<()>;

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()>;

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()>;

    async fn put_scaling_policy(&self, spec: &ScalingPolicySpec) -> ProviderResult<()>;

    async fn describe_policies(
        &self,
        group: &str,
        names: &[String],
    ) -> ProviderResult<Vec<ScalingPolicy>>;

    async fn put_scheduled_action(&self, action: &ScheduledAction) -> ProviderResult<()>;

    /// Drop capacity to zero so every member terminates.
    async fn shutdown_group(&self, group: &str) -> ProviderResult<()>;

    async fn delete_group(&self, group: &str, force: bool) -> ProviderResult<()>;
}

/// Individual instances, addresses and block volumes.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instance(&self, id: &str) -> ProviderResult<Option<InstanceInfo>>;

    /// Running instances carrying `Name = name`.
    async fn find_running_by_name(&self, name: &str) -> ProviderResult<Vec<InstanceInfo>>;

    async fn run_instance(&self, spec: &RunInstanceSpec) -> ProviderResult<InstanceInfo>;

    async fn tag_instance(&self, id: &str, key: &str, value: &str) -> ProviderResult<()>;

    async fn describe_addresses(&self) -> ProviderResult<Vec<ElasticAddress>>;

    async fn associate_address(&self, instance: &str, address: &ElasticAddress)
    -> ProviderResult<()>;

    async fn find_volumes_by_name(&self, name: &str) -> ProviderResult<Vec<VolumeInfo>>;

    async fn describe_volume(&self, id: &str) -> ProviderResult<Option<VolumeInfo>>;

    async fn create_volume(&self, spec: &VolumeSpec) -> ProviderResult<VolumeInfo>;

    async fn attach_volume(&self, volume: &str, instance: &str, device: &str)
    -> ProviderResult<()>;

    async fn detach_volume(&self, volume: &str) -> ProviderResult<()>;

    async fn security_group_ids(&self, names: &[String]) -> ProviderResult<Vec<String>>;
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn describe(&self, name: &str) -> ProviderResult<Option<LoadBalancer>>;

    async fn create(&self, spec: &LoadBalancerSpec) -> ProviderResult<LoadBalancer>;

    async fn configure_health_check(&self, name: &str, check: &HealthCheck)
    -> ProviderResult<()>;

    async fn register_instances(&self, name: &str, instances: &[String]) -> ProviderResult<()>;

    async fn deregister_instances(&self, name: &str, instances: &[String])
    -> ProviderResult<()>;

    async fn instance_health(
        &self,
        name: &str,
        instances: &[String],
    ) -> ProviderResult<Vec<(String, InstanceHealth)>>;

    /// Providers without balancer tagging return `ProviderError::Unsupported`.
    async fn add_tags(&self, name: &str, tags: &[Tag]) -> ProviderResult<()>;
}

#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Resolve the hosted zone id for a zone name (trailing dot significant).
    async fn zone_id(&self, zone: &str) -> ProviderResult<String>;

    /// Apply all changes as one atomic batch.
    async fn commit(&self, zone_id: &str, changes: &[RecordChange]) -> ProviderResult<()>;
}

#[async_trait]
pub trait AlarmApi: Send + Sync {
    async fn put_alarm(&self, spec: &AlarmSpec) -> ProviderResult<()>;

    async fn delete_alarms(&self, names: &[String]) -> ProviderResult<()>;
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        contents: &[u8],
        acl: &str,
    ) -> ProviderResult<()>;
}

/// Command execution and file placement on a managed host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn run(&self, host: &str, command: &str) -> ProviderResult<CommandOutput>;

    async fn upload(&self, host: &str, path: &str, contents: &str) -> ProviderResult<()>;

    /// Remove files matching a single-`*` glob.
    async fn remove(&self, host: &str, pattern: &str) -> ProviderResult<()>;
}

/// Bundle of collaborators handed to every component.
#[derive(Clone)]
pub struct Cloud {
    pub scaling: Arc<dyn ScalingApi>,
    pub compute: Arc<dyn ComputeApi>,
    pub load_balancers: Arc<dyn LoadBalancerApi>,
    pub dns: Arc<dyn DnsApi>,
    pub alarms: Arc<dyn AlarmApi>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub remote: Arc<dyn RemoteExec>,
}

impl std::fmt::Debug for Cloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloud").finish_non_exhaustive()
    }
}
