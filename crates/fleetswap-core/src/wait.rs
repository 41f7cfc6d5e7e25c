//! Bounded polling of eventually consistent cloud state.
//!
//! A probe is re-run every `interval` until it yields a value. Each run must
//! fetch fresh state. Transient provider errors count as "not yet"; any other
//! error ends the wait. The whole wait is bounded by `timeout`, and dropping
//! the future cancels it.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{DeployError, Result};
use crate::provider::{
    ComputeApi, InstanceHealth, InstanceInfo, InstanceState, LoadBalancerApi, ScalingApi,
    VolumeInfo, VolumeStatus,
};
use crate::types::Fleet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(600))
    }
}

/// Re-run `probe` until it returns `Some`, the policy times out, or it fails.
pub async fn wait_until<T, F, Fut>(policy: WaitPolicy, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let poll = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match probe().await {
                Ok(Some(value)) => {
                    debug!(what, attempt, "wait satisfied");
                    return Ok(value);
                }
                Ok(None) => trace!(what, attempt, "still waiting"),
                Err(e) if e.is_transient() => {
                    debug!(what, attempt, error = %e, "transient error while waiting")
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(policy.interval).await;
        }
    };

    match tokio::time::timeout(policy.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(DeployError::Timeout {
            what: what.to_string(),
            waited: policy.timeout,
        }),
    }
}

/// Wait until the group reports at least one member.
pub async fn fleet_has_members(
    scaling: &dyn ScalingApi,
    policy: WaitPolicy,
    group: &str,
) -> Result<Fleet> {
    wait_until(policy, &format!("members of {group}"), || async move {
        match scaling.describe_group(group).await? {
            Some(found) if !found.instances.is_empty() => Ok(Some(Fleet::from(found))),
            Some(_) => Ok(None),
            None => Err(DeployError::Provider(
                crate::error::ProviderError::NotFound(format!("scaling group {group}")),
            )),
        }
    })
    .await
}

/// Wait until the group has no members left.
pub async fn fleet_drained(scaling: &dyn ScalingApi, policy: WaitPolicy, group: &str) -> Result<()> {
    wait_until(policy, &format!("{group} to drain"), || async move {
        Ok(match scaling.describe_group(group).await? {
            Some(found) if !found.instances.is_empty() => None,
            _ => Some(()),
        })
    })
    .await
}

async fn wait_for_instance<P>(
    compute: &dyn ComputeApi,
    policy: WaitPolicy,
    what: String,
    id: &str,
    accept: P,
) -> Result<InstanceInfo>
where
    P: Fn(&InstanceInfo) -> bool,
{
    let accept = &accept;
    wait_until(policy, &what, || async move {
        Ok(compute
            .describe_instance(id)
            .await?
            .filter(|instance| accept(instance)))
    })
    .await
}

pub async fn instance_running(
    compute: &dyn ComputeApi,
    policy: WaitPolicy,
    id: &str,
) -> Result<InstanceInfo> {
    wait_for_instance(compute, policy, format!("{id} to be running"), id, |i| {
        i.state == InstanceState::Running
    })
    .await
}

pub async fn instance_has_address(
    compute: &dyn ComputeApi,
    policy: WaitPolicy,
    id: &str,
) -> Result<InstanceInfo> {
    wait_for_instance(compute, policy, format!("a public address on {id}"), id, |i| {
        i.public_address().is_some()
    })
    .await
}

pub async fn volume_available(
    compute: &dyn ComputeApi,
    policy: WaitPolicy,
    id: &str,
) -> Result<VolumeInfo> {
    wait_until(policy, &format!("volume {id} to be available"), || async move {
        Ok(compute
            .describe_volume(id)
            .await?
            .filter(|volume| volume.status == VolumeStatus::Available))
    })
    .await
}

/// Wait until every instance reports in service on the balancer.
pub async fn instances_in_service(
    balancers: &dyn LoadBalancerApi,
    policy: WaitPolicy,
    balancer: &str,
    instances: &[String],
) -> Result<()> {
    if instances.is_empty() {
        return Ok(());
    }
    wait_until(
        policy,
        &format!("{} instance(s) in service on {balancer}", instances.len()),
        || async move {
            let health = balancers.instance_health(balancer, instances).await?;
            let healthy = health.len() == instances.len()
                && health
                    .iter()
                    .all(|(_, state)| *state == InstanceHealth::InService);
            Ok(healthy.then_some(()))
        },
    )
    .await
}
