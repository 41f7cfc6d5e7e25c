//! Request and response shapes exchanged with cloud collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key/value tag on a scaling group, load balancer or instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub propagate_at_launch: bool,
}

/// Immutable instance-launch specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchTemplateSpec {
    pub name: String,
    pub image_id: String,
    pub key_name: String,
    pub security_groups: Vec<String>,
    pub user_data: String,
    pub instance_type: String,
    pub instance_profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingGroupSpec {
    pub name: String,
    pub launch_template: String,
    pub load_balancers: Vec<String>,
    pub zones: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub default_cooldown: u32,
}

/// Observed state of a scaling group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub name: String,
    pub launch_template: String,
    pub load_balancers: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub tags: Vec<Tag>,
    pub instances: Vec<String>,
    pub suspended_processes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicySpec {
    pub name: String,
    pub group: String,
    /// Signed change in capacity applied when the policy fires
    pub adjustment: i32,
    pub cooldown: u32,
}

/// A scaling policy with the provider-assigned reference alarms bind to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub name: String,
    pub group: String,
    pub arn: String,
    pub adjustment: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn as_operator(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => "GreaterThanThreshold",
            Comparison::LessThan => "LessThanThreshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSpec {
    pub name: String,
    pub namespace: String,
    pub metric: String,
    pub statistic: String,
    pub comparison: Comparison,
    pub threshold: f64,
    pub period_seconds: u32,
    pub evaluation_periods: u32,
    pub actions: Vec<String>,
    pub dimensions: BTreeMap<String, String>,
}

/// One-off capacity change executed by the scaling service at `start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub group: String,
    pub name: String,
    pub min_size: u32,
    pub desired_capacity: u32,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    pub fn parse(value: &str) -> Self {
        match value {
            "running" => InstanceState::Running,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            _ => InstanceState::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub state: InstanceState,
    pub public_dns: Option<String>,
    pub public_ip: Option<String>,
    pub zone: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl InstanceInfo {
    /// The address QA names and monitoring bind to.
    pub fn public_address(&self) -> Option<&str> {
        self.public_dns
            .as_deref()
            .filter(|dns| !dns.is_empty())
            .or(self.public_ip.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInstanceSpec {
    pub image_id: String,
    pub key_name: String,
    pub security_groups: Vec<String>,
    pub user_data: String,
    pub instance_type: String,
    pub instance_profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticAddress {
    pub public_ip: String,
    pub allocation_id: Option<String>,
    pub instance_id: Option<String>,
}

impl ElasticAddress {
    pub fn is_free(&self) -> bool {
        self.instance_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Deleting,
    Error,
}

impl VolumeStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "available" => VolumeStatus::Available,
            "in-use" => VolumeStatus::InUse,
            "deleting" => VolumeStatus::Deleting,
            "error" => VolumeStatus::Error,
            _ => VolumeStatus::Creating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub id: String,
    pub status: VolumeStatus,
    pub attached_to: Option<String>,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub size_gb: u32,
    pub volume_type: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub load_balancer_port: u16,
    pub instance_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub zones: Vec<String>,
    pub security_groups: Vec<String>,
    pub listeners: Vec<Listener>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub interval_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub target: String,
}

impl HealthCheck {
    /// Check applied to every load balancer this tool creates.
    pub fn standard() -> Self {
        HealthCheck {
            interval_seconds: 10,
            healthy_threshold: 2,
            unhealthy_threshold: 3,
            target: "HTTP:80/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    pub dns_name: String,
    /// Hosted zone of the balancer's DNS name, used for apex aliases
    pub hosted_zone_id: String,
    pub instances: Vec<String>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceHealth {
    InService,
    OutOfService,
    Unknown,
}

/// A single record change inside an atomic DNS batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordChange {
    /// Apex-capable alias record pointing at a load balancer
    UpsertAlias {
        name: String,
        target_dns: String,
        target_zone_id: String,
        evaluate_target_health: bool,
    },
    UpsertCname {
        name: String,
        value: String,
        ttl: u32,
    },
}

impl RecordChange {
    pub fn name(&self) -> &str {
        match self {
            RecordChange::UpsertAlias { name, .. } | RecordChange::UpsertCname { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
