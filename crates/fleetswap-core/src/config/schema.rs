//! Configuration schema for fleetswap.toml
//!
//! One file describes a project: account-wide settings at the top level and
//! one `[environments.<name>]` block per deploy target.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for fleetswap.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetswapConfig {
    /// Project name, used in most resource names
    pub project: String,

    pub region: String,

    /// Credentials profile for the provider tooling
    #[serde(default)]
    pub profile: Option<String>,

    /// Availability zones for groups and load balancers
    #[serde(default)]
    pub zones: Vec<String>,

    /// Environment that receives elastic addresses
    #[serde(default = "default_production_environment")]
    pub production_environment: String,

    /// Where the role ledger lives (defaults to the user state directory)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub user_data: UserDataConfig,

    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    #[serde(default)]
    pub monitoring: Option<MonitoringConfig>,

    #[serde(default)]
    pub alarms: AlarmConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub cutover: CutoverConfig,

    /// Extra template variables shared by all environments
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentEntry>,
}

fn default_production_environment() -> String {
    "live".to_string()
}

/// Paths of the instance bootstrap scripts (rendered as templates)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDataConfig {
    #[serde(default)]
    pub app: Option<PathBuf>,

    #[serde(default)]
    pub logging: Option<PathBuf>,
}

/// Bootstrap files pushed to the artifact store before each deploy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub bucket: String,

    #[serde(default = "default_acl")]
    pub acl: String,

    /// Object name (relative to `<env>/bootstrap/`) -> local template path
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

fn default_acl() -> String {
    "authenticated-read".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub ami_id: String,

    #[serde(default)]
    pub instance_type: Option<String>,

    /// Names bound to the logging instance
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default = "default_volume_size")]
    pub volume_size_gb: u32,

    #[serde(default = "default_volume_type")]
    pub volume_type: String,

    #[serde(default = "default_volume_name")]
    pub volume_name: String,

    #[serde(default = "default_device")]
    pub device: String,
}

fn default_volume_size() -> u32 {
    100
}

fn default_volume_type() -> String {
    "gp2".to_string()
}

fn default_volume_name() -> String {
    "logger-volume".to_string()
}

fn default_device() -> String {
    "/dev/sda2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Host running the monitoring master
    pub master_host: String,

    /// Directory holding per-instance host definitions
    pub config_dir: String,

    /// Local template rendered once per instance
    pub template: PathBuf,

    #[serde(default)]
    pub group_name: String,

    #[serde(default = "default_check_command")]
    pub check_command: String,

    #[serde(default = "default_restart_command")]
    pub restart_command: String,
}

fn default_check_command() -> String {
    "sudo /etc/nagios/check_config".to_string()
}

fn default_restart_command() -> String {
    "sudo /etc/init.d/nagios3 restart".to_string()
}

/// Metric alarms wired to the scale-up/scale-down policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default = "default_statistic")]
    pub statistic: String,

    #[serde(default = "default_threshold_up")]
    pub threshold_up: f64,

    #[serde(default = "default_threshold_down")]
    pub threshold_down: f64,

    #[serde(default = "default_period")]
    pub period_seconds: u32,

    #[serde(default = "default_evaluation_periods")]
    pub evaluation_periods: u32,
}

fn default_namespace() -> String {
    "AWS/EC2".to_string()
}

fn default_metric() -> String {
    "CPUUtilization".to_string()
}

fn default_statistic() -> String {
    "Average".to_string()
}

fn default_threshold_up() -> f64 {
    50.0
}

fn default_threshold_down() -> f64 {
    20.0
}

fn default_period() -> u32 {
    60
}

fn default_evaluation_periods() -> u32 {
    1
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            metric: default_metric(),
            statistic: default_statistic(),
            threshold_up: default_threshold_up(),
            threshold_down: default_threshold_down(),
            period_seconds: default_period(),
            evaluation_periods: default_evaluation_periods(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timeout_seconds() -> u64 {
    600
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoverConfig {
    /// Upper bound on waiting for the new fleet to pass balancer checks
    #[serde(default = "default_health_timeout")]
    pub health_timeout_seconds: u64,

    /// Extra margin after the health check before the old fleet is removed
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,

    /// Delay before the demoted fleet shrinks to its minimum
    #[serde(default = "default_scale_down_delay")]
    pub scale_down_delay_seconds: u64,
}

fn default_health_timeout() -> u64 {
    300
}

fn default_settle_seconds() -> u64 {
    15
}

fn default_scale_down_delay() -> u64 {
    30
}

impl Default for CutoverConfig {
    fn default() -> Self {
        Self {
            health_timeout_seconds: default_health_timeout(),
            settle_seconds: default_settle_seconds(),
            scale_down_delay_seconds: default_scale_down_delay(),
        }
    }
}

/// One deploy target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    /// Hosted zone name; the trailing dot is significant
    pub zone: String,

    /// Apex record repointed at the load balancer
    pub base_url: String,

    /// Production aliases repointed at the load balancer
    #[serde(default)]
    pub urls: Vec<String>,

    /// Per-instance QA names; `{index}` is replaced by the 1-based slot
    #[serde(default)]
    pub qa_urls: Vec<String>,

    pub ami_image_id: String,

    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    /// Security group names (defaults to the environment name)
    #[serde(default)]
    pub security_groups: Option<Vec<String>>,

    #[serde(default = "default_capacity")]
    pub min_size: u32,

    #[serde(default = "default_capacity")]
    pub max_size: u32,

    #[serde(default = "default_capacity")]
    pub desired_capacity: u32,

    #[serde(default = "default_cooldown")]
    pub default_cooldown: u32,

    #[serde(default = "default_adjustment_up")]
    pub adjustment_up: i32,

    #[serde(default = "default_adjustment_down")]
    pub adjustment_down: i32,

    #[serde(default = "default_ttl")]
    pub ttl_seconds: u32,

    #[serde(default)]
    pub load_balancer_name: Option<String>,

    /// Key pair name (defaults to `<project>-<environment>`)
    #[serde(default)]
    pub key_name: Option<String>,

    /// Instance profile (defaults to `<project>-ec2-<environment>`)
    #[serde(default)]
    pub instance_profile: Option<String>,

    /// Override for whether instances get elastic addresses
    #[serde(default)]
    pub assign_elastic_addresses: Option<bool>,

    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

fn default_instance_type() -> String {
    "t2.medium".to_string()
}

fn default_capacity() -> u32 {
    1
}

fn default_cooldown() -> u32 {
    180
}

fn default_adjustment_up() -> i32 {
    1
}

fn default_adjustment_down() -> i32 {
    -1
}

fn default_ttl() -> u32 {
    60
}

impl FleetswapConfig {
    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.trim().is_empty() {
            anyhow::bail!("'project' must not be empty");
        }
        if self.polling.interval_ms == 0 {
            anyhow::bail!("[polling] interval_ms must be greater than zero");
        }
        for (name, env) in &self.environments {
            env.validate()
                .map_err(|e| anyhow::anyhow!("Invalid environment '{}': {}", name, e))?;
        }
        Ok(())
    }
}

impl EnvironmentEntry {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.zone.ends_with('.') {
            anyhow::bail!("zone '{}' must end with a '.'", self.zone);
        }
        if self.min_size > self.max_size {
            anyhow::bail!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size,
                self.max_size
            );
        }
        if self.desired_capacity < self.min_size || self.desired_capacity > self.max_size {
            anyhow::bail!(
                "desired_capacity ({}) must lie within [{}, {}]",
                self.desired_capacity,
                self.min_size,
                self.max_size
            );
        }
        for url in &self.qa_urls {
            if !url.contains("{index}") {
                anyhow::bail!("qa url '{}' is missing the {{index}} placeholder", url);
            }
        }
        Ok(())
    }
}
