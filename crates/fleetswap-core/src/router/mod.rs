//! Load balancer membership, DNS records and elastic addresses.
//!
//! Balancer registration is a read-modify-write on the backend set, so every
//! register/deregister of one router is serialized.

mod addresses;
mod dns;
mod load_balancer;

pub use dns::QaBinding;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EnvironmentConfig;
use crate::provider::Cloud;
use crate::wait::WaitPolicy;

#[derive(Debug, Clone)]
pub struct TrafficRouter {
    cloud: Cloud,
    env: Arc<EnvironmentConfig>,
    policy: WaitPolicy,
    backend: Arc<Mutex<()>>,
}

impl TrafficRouter {
    pub fn new(cloud: Cloud, env: Arc<EnvironmentConfig>) -> Self {
        let policy = WaitPolicy::new(env.poll_interval(), env.poll_timeout());
        Self {
            cloud,
            env,
            policy,
            backend: Arc::new(Mutex::new(())),
        }
    }
}
