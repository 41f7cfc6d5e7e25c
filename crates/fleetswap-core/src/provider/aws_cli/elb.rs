use async_trait::async_trait;
use serde_json::{Value, json};

use super::{AwsCli, absent_if_missing, flag, items, number, text, texts};
use crate::error::ProviderError;
use crate::provider::{
    HealthCheck, InstanceHealth, LoadBalancer, LoadBalancerApi, LoadBalancerSpec, ProviderResult,
    Tag,
};

const SERVICE: &str = "elb";

/// Seconds a single health probe may take.
const HEALTH_CHECK_TIMEOUT: u32 = 5;

fn parse_balancer(value: &Value) -> Option<LoadBalancer> {
    let health_check = value.get("HealthCheck").and_then(|h| {
        Some(HealthCheck {
            target: text(h, "Target")?,
            interval_seconds: number(h, "Interval"),
            healthy_threshold: number(h, "HealthyThreshold"),
            unhealthy_threshold: number(h, "UnhealthyThreshold"),
        })
    });
    Some(LoadBalancer {
        name: text(value, "LoadBalancerName")?,
        dns_name: text(value, "DNSName").unwrap_or_default(),
        hosted_zone_id: text(value, "CanonicalHostedZoneNameID").unwrap_or_default(),
        instances: texts(value, "Instances", "InstanceId"),
        health_check,
    })
}

fn instance_list(instances: &[String]) -> Vec<String> {
    let mut args = vec!["--instances".to_string()];
    args.extend(instances.iter().cloned());
    args
}

#[async_trait]
impl LoadBalancerApi for AwsCli {
    async fn describe(&self, name: &str) -> ProviderResult<Option<LoadBalancer>> {
        let response = absent_if_missing(
            self.call(
                SERVICE,
                "describe-load-balancers",
                flag("--load-balancer-names", name).to_vec(),
            )
            .await,
        )?;
        Ok(response.and_then(|r| {
            items(&r, "LoadBalancerDescriptions")
                .iter()
                .find_map(parse_balancer)
        }))
    }

    async fn create(&self, spec: &LoadBalancerSpec) -> ProviderResult<LoadBalancer> {
        let listeners: Vec<Value> = spec
            .listeners
            .iter()
            .map(|l| {
                json!({
                    "Protocol": l.protocol,
                    "LoadBalancerPort": l.load_balancer_port,
                    "InstanceProtocol": l.protocol,
                    "InstancePort": l.instance_port,
                })
            })
            .collect();
        let mut args = flag("--load-balancer-name", &spec.name).to_vec();
        args.extend(flag("--listeners", Value::Array(listeners)));
        if !spec.zones.is_empty() {
            args.push("--availability-zones".to_string());
            args.extend(spec.zones.iter().cloned());
        }
        if !spec.security_groups.is_empty() {
            args.push("--security-groups".to_string());
            args.extend(spec.security_groups.iter().cloned());
        }
        self.call(SERVICE, "create-load-balancer", args).await?;

        self.describe(&spec.name).await?.ok_or_else(|| {
            ProviderError::Transient(format!("load balancer {} not visible yet", spec.name))
        })
    }

    async fn configure_health_check(&self, name: &str, check: &HealthCheck) -> ProviderResult<()> {
        let mut args = flag("--load-balancer-name", name).to_vec();
        args.extend(flag(
            "--health-check",
            json!({
                "Target": check.target,
                "Interval": check.interval_seconds,
                "Timeout": HEALTH_CHECK_TIMEOUT,
                "UnhealthyThreshold": check.unhealthy_threshold,
                "HealthyThreshold": check.healthy_threshold,
            }),
        ));
        self.call(SERVICE, "configure-health-check", args).await?;
        Ok(())
    }

    async fn register_instances(&self, name: &str, instances: &[String]) -> ProviderResult<()> {
        let mut args = flag("--load-balancer-name", name).to_vec();
        args.extend(instance_list(instances));
        self.call(SERVICE, "register-instances-with-load-balancer", args)
            .await?;
        Ok(())
    }

    async fn deregister_instances(&self, name: &str, instances: &[String]) -> ProviderResult<()> {
        let mut args = flag("--load-balancer-name", name).to_vec();
        args.extend(instance_list(instances));
        self.call(SERVICE, "deregister-instances-from-load-balancer", args)
            .await?;
        Ok(())
    }

    async fn instance_health(
        &self,
        name: &str,
        instances: &[String],
    ) -> ProviderResult<Vec<(String, InstanceHealth)>> {
        let mut args = flag("--load-balancer-name", name).to_vec();
        if !instances.is_empty() {
            args.extend(instance_list(instances));
        }
        let response = self.call(SERVICE, "describe-instance-health", args).await?;
        Ok(items(&response, "InstanceStates")
            .iter()
            .filter_map(|s| {
                let health = match s.get("State").and_then(Value::as_str) {
                    Some("InService") => InstanceHealth::InService,
                    Some("OutOfService") => InstanceHealth::OutOfService,
                    _ => InstanceHealth::Unknown,
                };
                Some((text(s, "InstanceId")?, health))
            })
            .collect())
    }

    async fn add_tags(&self, name: &str, tags: &[Tag]) -> ProviderResult<()> {
        let tags: Vec<Value> = tags
            .iter()
            .map(|t| json!({ "Key": t.key, "Value": t.value }))
            .collect();
        let mut args = flag("--load-balancer-names", name).to_vec();
        args.extend(flag("--tags", Value::Array(tags)));
        self.call(SERVICE, "add-tags", args).await?;
        Ok(())
    }
}
