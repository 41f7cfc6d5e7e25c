//! Fleetswap Core Library
//!
//! Blue/green deploys of auto-scaled instance fleets: a new fleet is stood up
//! in QA next to the live one, confirmed into production behind the load
//! balancer, and the previous fleet is retired.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod monitoring;
pub mod naming;
pub mod provider;
pub mod provisioner;
pub mod roles;
pub mod router;
pub mod state;
pub mod template;
pub mod types;
pub mod wait;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, EnvironmentConfig, FleetswapConfig};
    pub use crate::context::AppContext;

    // Errors
    pub use crate::error::{DeployError, ProviderError, Result};

    // Lifecycle
    pub use crate::lifecycle::{
        AbortReport, ConfirmReport, DeployReport, EnvironmentStatus, FleetStatus, Lifecycle,
        LoggingReport,
    };
    pub use crate::provisioner::logging::LoggingOutcome;
    pub use crate::router::QaBinding;

    // Providers
    pub use crate::provider::Cloud;
    pub use crate::provider::memory::InMemoryCloud;

    // Roles
    pub use crate::types::{Fleet, Role};
}
