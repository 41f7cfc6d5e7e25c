//! Project configuration and per-environment resolution
//!
//! `fleetswap.toml` is parsed once; each command then resolves an immutable
//! [`EnvironmentConfig`] for the selected environment and hands it (behind an
//! `Arc`) to every component it builds.

pub mod parser;
pub mod schema;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use parser::{parse_fleetswap_toml, parse_fleetswap_toml_str};
pub use schema::{
    AlarmConfig, BootstrapConfig, CutoverConfig, EnvironmentEntry, FleetswapConfig, LoggingConfig,
    MonitoringConfig, PollingConfig, UserDataConfig,
};
pub use store::ConfigStore;

use crate::error::{DeployError, Result};

/// Placeholder in QA URL patterns replaced by the 1-based slot number.
pub const QA_INDEX_PLACEHOLDER: &str = "{index}";

/// Target QA names are pointed at when no candidate is deployed.
pub const QA_SENTINEL: &str = "NOQA.";

/// Everything a deploy needs to know about one environment.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub project: String,
    pub environment: String,
    pub region: String,
    pub profile: Option<String>,
    pub zones: Vec<String>,
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,

    pub zone: String,
    pub base_url: String,
    pub urls: Vec<String>,
    pub qa_urls: Vec<String>,
    pub ttl_seconds: u32,

    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub instance_profile: String,
    pub security_groups: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub default_cooldown: u32,
    pub adjustment_up: i32,
    pub adjustment_down: i32,

    pub load_balancer_name: String,
    pub assign_elastic_addresses: bool,

    pub user_data: UserDataConfig,
    pub bootstrap: Option<BootstrapConfig>,
    pub logging: Option<LoggingConfig>,
    pub monitoring: Option<MonitoringConfig>,
    pub alarms: AlarmConfig,
    pub polling: PollingConfig,
    pub cutover: CutoverConfig,

    variables: BTreeMap<String, String>,
}

impl FleetswapConfig {
    /// Resolve the configuration of one environment.
    pub fn environment(&self, name: &str, base_dir: &Path) -> Result<EnvironmentConfig> {
        let entry = self.environments.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
            DeployError::Config(format!(
                "unknown environment '{}' (configured: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })?;

        let mut variables = self.variables.clone();
        variables.extend(entry.variables.clone());

        Ok(EnvironmentConfig {
            project: self.project.clone(),
            environment: name.to_string(),
            region: self.region.clone(),
            profile: self.profile.clone(),
            zones: self.zones.clone(),
            base_dir: base_dir.to_path_buf(),
            zone: entry.zone.clone(),
            base_url: entry.base_url.clone(),
            urls: entry.urls.clone(),
            qa_urls: entry.qa_urls.clone(),
            ttl_seconds: entry.ttl_seconds,
            image_id: entry.ami_image_id.clone(),
            instance_type: entry.instance_type.clone(),
            key_name: entry
                .key_name
                .clone()
                .unwrap_or_else(|| format!("{}-{}", self.project, name)),
            instance_profile: entry
                .instance_profile
                .clone()
                .unwrap_or_else(|| format!("{}-ec2-{}", self.project, name)),
            security_groups: entry
                .security_groups
                .clone()
                .unwrap_or_else(|| vec![name.to_string()]),
            min_size: entry.min_size,
            max_size: entry.max_size,
            desired_capacity: entry.desired_capacity,
            default_cooldown: entry.default_cooldown,
            adjustment_up: entry.adjustment_up,
            adjustment_down: entry.adjustment_down,
            load_balancer_name: entry
                .load_balancer_name
                .clone()
                .unwrap_or_else(|| format!("{}-{}", self.project, name)),
            assign_elastic_addresses: entry
                .assign_elastic_addresses
                .unwrap_or(name == self.production_environment),
            user_data: self.user_data.clone(),
            bootstrap: self.bootstrap.clone(),
            logging: self.logging.clone(),
            monitoring: self.monitoring.clone(),
            alarms: self.alarms.clone(),
            polling: self.polling.clone(),
            cutover: self.cutover.clone(),
            variables,
        })
    }
}

impl EnvironmentConfig {
    /// QA name for a 1-based slot, one per configured pattern.
    pub fn qa_urls_for_slot(&self, slot: usize) -> Vec<String> {
        self.qa_urls
            .iter()
            .map(|pattern| pattern.replace(QA_INDEX_PLACEHOLDER, &slot.to_string()))
            .collect()
    }

    /// `Name` tag propagated to fleet members.
    pub fn instance_name(&self) -> String {
        format!("{}-{}", self.project, self.environment)
    }

    pub fn logger_name(&self) -> String {
        format!("{}-logger", self.project)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.timeout_seconds)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Variables visible to every rendered template.
    pub fn template_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("project".to_string(), self.project.clone());
        vars.insert("environment".to_string(), self.environment.clone());
        vars.insert("region".to_string(), self.region.clone());
        vars.insert("zone".to_string(), self.zone.clone());
        vars.insert("base_url".to_string(), self.base_url.clone());
        vars.insert("instance_type".to_string(), self.instance_type.clone());
        vars.insert(
            "load_balancer_name".to_string(),
            self.load_balancer_name.clone(),
        );
        if let Some(bootstrap) = &self.bootstrap {
            vars.insert("bootstrap_bucket".to_string(), bootstrap.bucket.clone());
        }
        vars.extend(self.variables.clone());
        vars
    }
}
