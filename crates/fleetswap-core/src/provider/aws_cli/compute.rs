use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{AwsCli, absent_if_missing, flag, items, tag_pairs, text};
use crate::error::ProviderError;
use crate::provider::{
    ComputeApi, ElasticAddress, InstanceInfo, InstanceState, ProviderResult, RunInstanceSpec,
    VolumeInfo, VolumeSpec, VolumeStatus,
};
use crate::types::NAME_TAG;

const SERVICE: &str = "ec2";

fn parse_instance(value: &Value) -> Option<InstanceInfo> {
    Some(InstanceInfo {
        id: text(value, "InstanceId")?,
        state: value
            .get("State")
            .and_then(|s| s.get("Name"))
            .and_then(Value::as_str)
            .map(InstanceState::parse)
            .unwrap_or(InstanceState::Pending),
        public_dns: text(value, "PublicDnsName"),
        public_ip: text(value, "PublicIpAddress"),
        zone: value
            .get("Placement")
            .and_then(|p| text(p, "AvailabilityZone")),
        tags: tag_pairs(value).into_iter().collect::<BTreeMap<_, _>>(),
    })
}

/// Instances of every reservation in a `describe-instances` response.
fn reservation_instances(response: &Value) -> Vec<InstanceInfo> {
    items(response, "Reservations")
        .iter()
        .flat_map(|r| items(r, "Instances"))
        .filter_map(parse_instance)
        .collect()
}

fn parse_volume(value: &Value) -> Option<VolumeInfo> {
    Some(VolumeInfo {
        id: text(value, "VolumeId")?,
        status: value
            .get("State")
            .and_then(Value::as_str)
            .map(VolumeStatus::parse)
            .unwrap_or(VolumeStatus::Creating),
        attached_to: items(value, "Attachments")
            .iter()
            .find_map(|a| text(a, "InstanceId")),
        zone: text(value, "AvailabilityZone").unwrap_or_default(),
    })
}

fn tag_filter(key: &str, value: &str) -> String {
    format!("Name=tag:{key},Values={value}")
}

#[async_trait]
impl ComputeApi for AwsCli {
    async fn describe_instance(&self, id: &str) -> ProviderResult<Option<InstanceInfo>> {
        let response = absent_if_missing(
            self.call(SERVICE, "describe-instances", flag("--instance-ids", id).to_vec())
                .await,
        )?;
        Ok(response.and_then(|r| reservation_instances(&r).into_iter().find(|i| i.id == id)))
    }

    async fn find_running_by_name(&self, name: &str) -> ProviderResult<Vec<InstanceInfo>> {
        let args = vec![
            "--filters".to_string(),
            tag_filter(NAME_TAG, name),
            "Name=instance-state-name,Values=running".to_string(),
        ];
        let response = self.call(SERVICE, "describe-instances", args).await?;
        Ok(reservation_instances(&response))
    }

    async fn run_instance(&self, spec: &RunInstanceSpec) -> ProviderResult<InstanceInfo> {
        let mut args = Vec::new();
        args.extend(flag("--image-id", &spec.image_id));
        args.extend(flag("--key-name", &spec.key_name));
        args.extend(flag("--instance-type", &spec.instance_type));
        args.extend(flag(
            "--iam-instance-profile",
            format!("Name={}", spec.instance_profile),
        ));
        args.extend(flag("--user-data", &spec.user_data));
        args.extend(flag("--count", 1));
        if !spec.security_groups.is_empty() {
            args.push("--security-groups".to_string());
            args.extend(spec.security_groups.iter().cloned());
        }
        let response = self.call(SERVICE, "run-instances", args).await?;
        items(&response, "Instances")
            .iter()
            .find_map(parse_instance)
            .ok_or_else(|| ProviderError::Api("run-instances returned no instance".to_string()))
    }

    async fn tag_instance(&self, id: &str, key: &str, value: &str) -> ProviderResult<()> {
        let mut args = flag("--resources", id).to_vec();
        args.extend(flag("--tags", json!([{ "Key": key, "Value": value }])));
        self.call(SERVICE, "create-tags", args).await?;
        Ok(())
    }

    async fn describe_addresses(&self) -> ProviderResult<Vec<ElasticAddress>> {
        let response = self.call(SERVICE, "describe-addresses", Vec::new()).await?;
        Ok(items(&response, "Addresses")
            .iter()
            .filter_map(|a| {
                Some(ElasticAddress {
                    public_ip: text(a, "PublicIp")?,
                    allocation_id: text(a, "AllocationId"),
                    instance_id: text(a, "InstanceId"),
                })
            })
            .collect())
    }

    async fn associate_address(
        &self,
        instance: &str,
        address: &ElasticAddress,
    ) -> ProviderResult<()> {
        let mut args = flag("--instance-id", instance).to_vec();
        match &address.allocation_id {
            Some(allocation) => args.extend(flag("--allocation-id", allocation)),
            None => args.extend(flag("--public-ip", &address.public_ip)),
        }
        self.call(SERVICE, "associate-address", args).await?;
        Ok(())
    }

    async fn find_volumes_by_name(&self, name: &str) -> ProviderResult<Vec<VolumeInfo>> {
        let args = vec!["--filters".to_string(), tag_filter(NAME_TAG, name)];
        let response = self.call(SERVICE, "describe-volumes", args).await?;
        Ok(items(&response, "Volumes")
            .iter()
            .filter_map(parse_volume)
            .collect())
    }

    async fn describe_volume(&self, id: &str) -> ProviderResult<Option<VolumeInfo>> {
        let response = absent_if_missing(
            self.call(SERVICE, "describe-volumes", flag("--volume-ids", id).to_vec())
                .await,
        )?;
        Ok(response.and_then(|r| items(&r, "Volumes").iter().find_map(parse_volume)))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> ProviderResult<VolumeInfo> {
        let mut args = Vec::new();
        args.extend(flag("--size", spec.size_gb));
        args.extend(flag("--volume-type", &spec.volume_type));
        args.extend(flag("--availability-zone", &spec.zone));
        args.extend(flag(
            "--tag-specifications",
            json!([{
                "ResourceType": "volume",
                "Tags": [{ "Key": NAME_TAG, "Value": spec.name }],
            }]),
        ));
        let response = self.call(SERVICE, "create-volume", args).await?;
        parse_volume(&response)
            .ok_or_else(|| ProviderError::Api("create-volume returned no volume id".to_string()))
    }

    async fn attach_volume(&self, volume: &str, instance: &str, device: &str) -> ProviderResult<()> {
        let mut args = flag("--volume-id", volume).to_vec();
        args.extend(flag("--instance-id", instance));
        args.extend(flag("--device", device));
        self.call(SERVICE, "attach-volume", args).await?;
        Ok(())
    }

    async fn detach_volume(&self, volume: &str) -> ProviderResult<()> {
        self.call(SERVICE, "detach-volume", flag("--volume-id", volume).to_vec())
            .await?;
        Ok(())
    }

    async fn security_group_ids(&self, names: &[String]) -> ProviderResult<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["--group-names".to_string()];
        args.extend(names.iter().cloned());
        let response = self.call(SERVICE, "describe-security-groups", args).await?;
        Ok(items(&response, "SecurityGroups")
            .iter()
            .filter_map(|g| text(g, "GroupId"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_reservations() {
        let response = json!({
            "Reservations": [
                {"Instances": [{
                    "InstanceId": "i-1",
                    "State": {"Name": "running"},
                    "PublicDnsName": "",
                    "PublicIpAddress": "203.0.113.7",
                    "Placement": {"AvailabilityZone": "eu-west-1a"},
                    "Tags": [{"Key": "Name", "Value": "shop-logger"}]
                }]},
                {"Instances": [{"InstanceId": "i-2", "State": {"Name": "pending"}}]}
            ]
        });
        let instances = reservation_instances(&response);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].state, InstanceState::Running);
        assert_eq!(instances[0].public_dns, None);
        assert_eq!(instances[0].public_address(), Some("203.0.113.7"));
        assert_eq!(instances[0].tags.get("Name").map(String::as_str), Some("shop-logger"));
        assert_eq!(instances[1].state, InstanceState::Pending);
    }

    #[test]
    fn parses_attached_volume() {
        let volume = parse_volume(&json!({
            "VolumeId": "vol-1",
            "State": "in-use",
            "AvailabilityZone": "eu-west-1a",
            "Attachments": [{"InstanceId": "i-9", "State": "attached"}]
        }))
        .unwrap();
        assert_eq!(volume.status, VolumeStatus::InUse);
        assert_eq!(volume.attached_to.as_deref(), Some("i-9"));
    }
}
