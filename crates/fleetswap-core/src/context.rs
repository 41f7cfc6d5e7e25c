//! Application context shared by the frontends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigStore, EnvironmentConfig, FleetswapConfig};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::provider::Cloud;
use crate::provider::aws_cli::AwsCli;
use crate::provider::ssh::SshExec;
use crate::state::LedgerStore;

/// Loaded project configuration plus the paths derived from it.
///
/// The CLI creates this once per invocation and opens a [`Lifecycle`] for
/// the environment it was asked to operate on.
#[derive(Debug, Clone)]
pub struct AppContext {
    store: ConfigStore,
    config: FleetswapConfig,
    state_dir: PathBuf,
}

impl AppContext {
    /// Load `fleetswap.toml` and resolve the state directory.
    ///
    /// `state_dir` overrides the configured one, which in turn overrides the
    /// per-user default.
    pub fn load(store: ConfigStore, state_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = store.load()?;
        let state_dir = match (state_dir, &config.state_dir) {
            (Some(dir), _) => dir,
            (None, Some(configured)) if configured.is_absolute() => configured.clone(),
            (None, Some(configured)) => store.base_dir().join(configured),
            (None, None) => LedgerStore::default_dir()?,
        };
        Ok(Self::new(store, config, state_dir))
    }

    pub fn new(store: ConfigStore, config: FleetswapConfig, state_dir: PathBuf) -> Self {
        Self {
            store,
            config,
            state_dir,
        }
    }

    pub fn config(&self) -> &FleetswapConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        self.store.config_path()
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn environment(&self, name: &str) -> Result<Arc<EnvironmentConfig>> {
        Ok(Arc::new(
            self.config.environment(name, &self.store.base_dir())?,
        ))
    }

    /// Collaborators backed by the `aws` and `ssh` command-line tools.
    pub fn aws_cloud(&self, env: &EnvironmentConfig) -> Cloud {
        let aws = Arc::new(AwsCli::from_environment(env));
        Cloud {
            scaling: aws.clone(),
            compute: aws.clone(),
            load_balancers: aws.clone(),
            dns: aws.clone(),
            alarms: aws.clone(),
            artifacts: aws,
            remote: Arc::new(SshExec::new()),
        }
    }

    /// Lock `environment` and load its roles against `cloud`.
    pub async fn lifecycle(&self, cloud: Cloud, environment: &str) -> Result<Lifecycle> {
        let env = self.environment(environment)?;
        Lifecycle::open(cloud, env, &self.state_dir).await
    }
}
