use std::time::Duration;

use tracing::{info, warn};

use super::TrafficRouter;
use crate::error::{ProviderError, Result};
use crate::provider::{HealthCheck, Listener, LoadBalancer, LoadBalancerSpec};
use crate::types::{ENVIRONMENT_TAG, Fleet, ROLE_TAG, Role, tag};
use crate::wait;

impl TrafficRouter {
    /// Look up the environment's balancer, creating it on first use.
    pub async fn get_or_create_load_balancer(&self) -> Result<LoadBalancer> {
        let name = &self.env.load_balancer_name;
        let balancer = match self.cloud.load_balancers.describe(name).await? {
            Some(existing) => {
                info!(balancer = %name, "using existing load balancer");
                existing
            }
            None => self.create_load_balancer().await?,
        };
        self.tag_load_balancer(&balancer).await?;
        Ok(balancer)
    }

    async fn create_load_balancer(&self) -> Result<LoadBalancer> {
        let name = &self.env.load_balancer_name;
        info!(balancer = %name, "creating load balancer");
        let security_groups = self
            .cloud
            .compute
            .security_group_ids(&self.env.security_groups)
            .await?;
        let balancer = self
            .cloud
            .load_balancers
            .create(&LoadBalancerSpec {
                name: name.clone(),
                zones: self.env.zones.clone(),
                security_groups,
                listeners: vec![Listener {
                    load_balancer_port: 80,
                    instance_port: 80,
                    protocol: "HTTP".to_string(),
                }],
            })
            .await?;

        let check = HealthCheck::standard();
        info!(balancer = %name, target = %check.target, "configuring health check");
        self.cloud
            .load_balancers
            .configure_health_check(name, &check)
            .await?;
        Ok(LoadBalancer {
            health_check: Some(check),
            ..balancer
        })
    }

    async fn tag_load_balancer(&self, balancer: &LoadBalancer) -> Result<()> {
        let tags = [
            tag(ENVIRONMENT_TAG, &self.env.environment, false),
            tag(ROLE_TAG, Role::Active.as_tag(), false),
        ];
        match self.cloud.load_balancers.add_tags(&balancer.name, &tags).await {
            Ok(()) => Ok(()),
            Err(ProviderError::Unsupported(what)) => {
                warn!(balancer = %balancer.name, %what, "provider cannot tag load balancers, skipping");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add every current member of `fleet` to the balancer.
    pub async fn register_instances(&self, balancer: &LoadBalancer, fleet: &Fleet) -> Result<()> {
        let members = fleet.members();
        if members.is_empty() {
            return Ok(());
        }
        let _guard = self.backend.lock().await;
        info!(balancer = %balancer.name, fleet = %fleet.name, count = members.len(), "registering instances");
        self.cloud
            .load_balancers
            .register_instances(&balancer.name, &members)
            .await?;
        Ok(())
    }

    /// Remove every current member of `fleet` from the balancer.
    ///
    /// Only members the balancer still lists are sent, so repeating this
    /// after a partial failure is harmless.
    pub async fn deregister_instances(&self, balancer: &LoadBalancer, fleet: &Fleet) -> Result<()> {
        let _guard = self.backend.lock().await;
        let Some(current) = self.cloud.load_balancers.describe(&balancer.name).await? else {
            return Ok(());
        };
        let members: Vec<String> = fleet
            .members()
            .into_iter()
            .filter(|id| current.instances.contains(id))
            .collect();
        if members.is_empty() {
            return Ok(());
        }
        info!(balancer = %balancer.name, fleet = %fleet.name, count = members.len(), "deregistering instances");
        self.cloud
            .load_balancers
            .deregister_instances(&balancer.name, &members)
            .await?;
        Ok(())
    }

    /// Take `fleet` out of the environment's balancer, if it has one.
    pub async fn detach(&self, fleet: &Fleet) -> Result<()> {
        let name = &self.env.load_balancer_name;
        match self.cloud.load_balancers.describe(name).await? {
            Some(balancer) => self.deregister_instances(&balancer, fleet).await,
            None => Ok(()),
        }
    }

    /// Wait until every member of `fleet` passes the balancer health check.
    pub async fn wait_in_service(&self, balancer: &LoadBalancer, fleet: &Fleet) -> Result<()> {
        let policy = self.policy.with_timeout(Duration::from_secs(
            self.env.cutover.health_timeout_seconds,
        ));
        info!(balancer = %balancer.name, fleet = %fleet.name, "waiting for instances to pass health checks");
        wait::instances_in_service(
            self.cloud.load_balancers.as_ref(),
            policy,
            &balancer.name,
            &fleet.members(),
        )
        .await
    }
}
