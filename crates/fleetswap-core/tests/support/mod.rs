#![allow(dead_code)]

use std::sync::Arc;

use fleetswap_core::config::{EnvironmentConfig, parse_fleetswap_toml_str};
use fleetswap_core::error::Result;
use fleetswap_core::lifecycle::Lifecycle;
use fleetswap_core::provider::memory::InMemoryCloud;
use fleetswap_core::types::Fleet;
use tempfile::TempDir;

pub const ENVIRONMENT: &str = "stage";

/// Two-instance stage environment with fast polling and no settle delay.
pub const BASE_CONFIG: &str = r#"
project = "shop"
region = "eu-west-1"
zones = ["zone-a"]

[polling]
interval_ms = 100
timeout_seconds = 30

[cutover]
health_timeout_seconds = 30
settle_seconds = 0
scale_down_delay_seconds = 30

[environments.stage]
zone = "shop.example."
base_url = "shop.example."
urls = ["www.shop.example."]
qa_urls = ["qa{index}.shop.example."]
ami_image_id = "ami-1234"
min_size = 2
max_size = 2
desired_capacity = 2
"#;

pub const MONITORING_TEMPLATE: &str = "define host {\n  use {{ group_name }}\n  host_name {{ host_name }}\n  address {{ address }}\n}\n";

/// In-memory cloud plus a scratch directory for the ledger and templates.
pub struct Harness {
    pub cloud: Arc<InMemoryCloud>,
    pub temp: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cloud(InMemoryCloud::new())
    }

    pub fn with_cloud(cloud: InMemoryCloud) -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("nagios.cfg.tmpl"), MONITORING_TEMPLATE).unwrap();
        Self {
            cloud: Arc::new(cloud),
            temp,
        }
    }

    pub fn state_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("state")
    }

    /// Resolve the stage environment from `BASE_CONFIG` followed by `extra`.
    pub fn env(&self, extra: &str) -> Arc<EnvironmentConfig> {
        self.env_from(&format!("{BASE_CONFIG}\n{extra}"))
    }

    /// Resolve the stage environment from a complete config file.
    pub fn env_from(&self, config: &str) -> Arc<EnvironmentConfig> {
        let config = parse_fleetswap_toml_str(config).unwrap();
        Arc::new(config.environment(ENVIRONMENT, self.temp.path()).unwrap())
    }

    pub async fn lifecycle(&self, extra: &str) -> Lifecycle {
        self.open(self.env(extra)).await.unwrap()
    }

    pub async fn open(&self, env: Arc<EnvironmentConfig>) -> Result<Lifecycle> {
        Lifecycle::open(self.cloud.cloud(), env, &self.state_dir()).await
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Seed a settled fleet tagged for the stage environment.
    pub fn seed(&self, name: &str, role: &str, members: u32) -> Fleet {
        Fleet::from(self.cloud.seed_fleet(name, ENVIRONMENT, role, members))
    }

    pub fn cname_target(&self, name: &str) -> Option<String> {
        match self.cloud.record(name)? {
            fleetswap_core::provider::RecordChange::UpsertCname { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Base config with elastic addresses switched on for stage.
pub fn with_elastic_addresses() -> String {
    BASE_CONFIG.replace(
        "desired_capacity = 2\n",
        "desired_capacity = 2\nassign_elastic_addresses = true\n",
    )
}

pub const MASTER: &str = "nagios.shop.example";

pub fn monitoring_section() -> &'static str {
    r#"
[monitoring]
master_host = "nagios.shop.example"
config_dir = "/etc/nagios3/conf.d"
template = "nagios.cfg.tmpl"
group_name = "shop-servers"
"#
}
