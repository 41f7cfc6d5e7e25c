use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::{AwsCli, flag, items, number, tag_pairs, text, texts};
use crate::provider::{
    LaunchTemplateSpec, ProviderResult, ScalingApi, ScalingGroup, ScalingGroupSpec, ScalingPolicy,
    ScalingPolicySpec, ScheduledAction, Tag,
};

const SERVICE: &str = "autoscaling";

fn parse_group(value: &Value) -> Option<ScalingGroup> {
    let propagated: Vec<(String, bool)> = items(value, "Tags")
        .iter()
        .filter_map(|t| {
            Some((
                text(t, "Key")?,
                t.get("PropagateAtLaunch")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            ))
        })
        .collect();
    let tags = tag_pairs(value)
        .into_iter()
        .map(|(key, value)| {
            let propagate_at_launch = propagated
                .iter()
                .any(|(k, propagate)| *k == key && *propagate);
            Tag {
                key,
                value,
                propagate_at_launch,
            }
        })
        .collect();

    Some(ScalingGroup {
        name: text(value, "AutoScalingGroupName")?,
        launch_template: value
            .get("LaunchTemplate")
            .and_then(|t| text(t, "LaunchTemplateName"))
            .unwrap_or_default(),
        load_balancers: items(value, "LoadBalancerNames")
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        min_size: number(value, "MinSize"),
        max_size: number(value, "MaxSize"),
        desired_capacity: number(value, "DesiredCapacity"),
        tags,
        instances: texts(value, "Instances", "InstanceId"),
        suspended_processes: texts(value, "SuspendedProcesses", "ProcessName"),
    })
}

fn launch_template_data(spec: &LaunchTemplateSpec) -> Value {
    json!({
        "ImageId": spec.image_id,
        "KeyName": spec.key_name,
        "SecurityGroups": spec.security_groups,
        "UserData": STANDARD.encode(spec.user_data.as_bytes()),
        "InstanceType": spec.instance_type,
        "IamInstanceProfile": { "Name": spec.instance_profile },
    })
}

#[async_trait]
impl ScalingApi for AwsCli {
    async fn create_launch_template(&self, spec: &LaunchTemplateSpec) -> ProviderResult<()> {
        let mut args = Vec::new();
        args.extend(flag("--launch-template-name", &spec.name));
        args.extend(flag("--launch-template-data", launch_template_data(spec)));
        self.call("ec2", "create-launch-template", args).await?;
        Ok(())
    }

    async fn delete_launch_template(&self, name: &str) -> ProviderResult<()> {
        self.call(
            "ec2",
            "delete-launch-template",
            flag("--launch-template-name", name).to_vec(),
        )
        .await?;
        Ok(())
    }

    async fn create_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        let mut args = Vec::new();
        args.extend(flag("--auto-scaling-group-name", &spec.name));
        args.extend(flag(
            "--launch-template",
            format!("LaunchTemplateName={}", spec.launch_template),
        ));
        args.extend(flag("--min-size", spec.min_size));
        args.extend(flag("--max-size", spec.max_size));
        args.extend(flag("--desired-capacity", spec.desired_capacity));
        args.extend(flag("--default-cooldown", spec.default_cooldown));
        if !spec.zones.is_empty() {
            args.push("--availability-zones".to_string());
            args.extend(spec.zones.iter().cloned());
        }
        if !spec.load_balancers.is_empty() {
            args.push("--load-balancer-names".to_string());
            args.extend(spec.load_balancers.iter().cloned());
        }
        self.call(SERVICE, "create-auto-scaling-group", args).await?;
        Ok(())
    }

    async fn describe_groups(&self) -> ProviderResult<Vec<ScalingGroup>> {
        let response = self
            .call(SERVICE, "describe-auto-scaling-groups", Vec::new())
            .await?;
        Ok(items(&response, "AutoScalingGroups")
            .iter()
            .filter_map(parse_group)
            .collect())
    }

    async fn describe_group(&self, name: &str) -> ProviderResult<Option<ScalingGroup>> {
        let response = self
            .call(
                SERVICE,
                "describe-auto-scaling-groups",
                flag("--auto-scaling-group-names", name).to_vec(),
            )
            .await?;
        Ok(items(&response, "AutoScalingGroups")
            .iter()
            .filter_map(parse_group)
            .find(|group| group.name == name))
    }

    async fn create_or_update_tags(&self, group: &str, tags: &[Tag]) -> ProviderResult<()> {
        let tags: Vec<Value> = tags
            .iter()
            .map(|t| {
                json!({
                    "ResourceId": group,
                    "ResourceType": "auto-scaling-group",
                    "Key": t.key,
                    "Value": t.value,
                    "PropagateAtLaunch": t.propagate_at_launch,
                })
            })
            .collect();
        self.call(
            SERVICE,
            "create-or-update-tags",
            flag("--tags", Value::Array(tags)).to_vec(),
        )
        .await?;
        Ok(())
    }

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()> {
        let mut args = flag("--auto-scaling-group-name", group).to_vec();
        args.push("--scaling-processes".to_string());
        args.extend(processes.iter().map(|p| p.to_string()));
        self.call(SERVICE, "suspend-processes", args).await?;
        Ok(())
    }

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()> {
        let mut args = flag("--auto-scaling-group-name", group).to_vec();
        args.push("--scaling-processes".to_string());
        args.extend(processes.iter().map(|p| p.to_string()));
        self.call(SERVICE, "resume-processes", args).await?;
        Ok(())
    }

    async fn put_scaling_policy(&self, spec: &ScalingPolicySpec) -> ProviderResult<()> {
        let mut args = Vec::new();
        args.extend(flag("--auto-scaling-group-name", &spec.group));
        args.extend(flag("--policy-name", &spec.name));
        args.extend(flag("--adjustment-type", "ChangeInCapacity"));
        args.extend(flag("--scaling-adjustment", spec.adjustment));
        args.extend(flag("--cooldown", spec.cooldown));
        self.call(SERVICE, "put-scaling-policy", args).await?;
        Ok(())
    }

    async fn describe_policies(
        &self,
        group: &str,
        names: &[String],
    ) -> ProviderResult<Vec<ScalingPolicy>> {
        let mut args = flag("--auto-scaling-group-name", group).to_vec();
        if !names.is_empty() {
            args.push("--policy-names".to_string());
            args.extend(names.iter().cloned());
        }
        let response = self.call(SERVICE, "describe-policies", args).await?;
        Ok(items(&response, "ScalingPolicies")
            .iter()
            .filter_map(|p| {
                Some(ScalingPolicy {
                    name: text(p, "PolicyName")?,
                    group: text(p, "AutoScalingGroupName").unwrap_or_else(|| group.to_string()),
                    arn: text(p, "PolicyARN")?,
                    adjustment: p
                        .get("ScalingAdjustment")
                        .and_then(Value::as_i64)
                        .and_then(|n| i32::try_from(n).ok())
                        .unwrap_or(0),
                })
            })
            .collect())
    }

    async fn put_scheduled_action(&self, action: &ScheduledAction) -> ProviderResult<()> {
        let mut args = Vec::new();
        args.extend(flag("--auto-scaling-group-name", &action.group));
        args.extend(flag("--scheduled-action-name", &action.name));
        args.extend(flag("--start-time", action.start_time.to_rfc3339()));
        args.extend(flag("--min-size", action.min_size));
        args.extend(flag("--desired-capacity", action.desired_capacity));
        self.call(SERVICE, "put-scheduled-update-group-action", args)
            .await?;
        Ok(())
    }

    async fn shutdown_group(&self, group: &str) -> ProviderResult<()> {
        let mut args = flag("--auto-scaling-group-name", group).to_vec();
        args.extend(flag("--min-size", 0));
        args.extend(flag("--max-size", 0));
        args.extend(flag("--desired-capacity", 0));
        self.call(SERVICE, "update-auto-scaling-group", args).await?;
        Ok(())
    }

    async fn delete_group(&self, group: &str, force: bool) -> ProviderResult<()> {
        let mut args = flag("--auto-scaling-group-name", group).to_vec();
        if force {
            args.push("--force-delete".to_string());
        }
        self.call(SERVICE, "delete-auto-scaling-group", args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_described_group() {
        let value = json!({
            "AutoScalingGroupName": "asg-shop-stage-1",
            "LaunchTemplate": {"LaunchTemplateName": "lt-shop-stage-1"},
            "LoadBalancerNames": ["shop-stage"],
            "MinSize": 1, "MaxSize": 4, "DesiredCapacity": 2,
            "Instances": [{"InstanceId": "i-2"}, {"InstanceId": "i-1"}],
            "SuspendedProcesses": [{"ProcessName": "AddToLoadBalancer"}],
            "Tags": [
                {"Key": "env", "Value": "stage", "PropagateAtLaunch": false},
                {"Key": "Name", "Value": "shop-stage", "PropagateAtLaunch": true}
            ]
        });
        let group = parse_group(&value).unwrap();
        assert_eq!(group.name, "asg-shop-stage-1");
        assert_eq!(group.launch_template, "lt-shop-stage-1");
        assert_eq!(group.instances, vec!["i-2", "i-1"]);
        assert_eq!(group.suspended_processes, vec!["AddToLoadBalancer"]);
        assert_eq!(group.desired_capacity, 2);
        assert!(group.tags.iter().any(|t| t.key == "Name" && t.propagate_at_launch));
        assert!(group.tags.iter().any(|t| t.key == "env" && !t.propagate_at_launch));
    }

    #[test]
    fn user_data_is_base64_encoded() {
        let spec = LaunchTemplateSpec {
            name: "lt".to_string(),
            image_id: "ami-1".to_string(),
            key_name: "key".to_string(),
            security_groups: vec!["stage".to_string()],
            user_data: "#!/bin/sh\necho hi\n".to_string(),
            instance_type: "t2.medium".to_string(),
            instance_profile: "profile".to_string(),
        };
        let data = launch_template_data(&spec);
        let encoded = data["UserData"].as_str().unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), spec.user_data.as_bytes());
        assert_eq!(data["IamInstanceProfile"]["Name"], "profile");
    }
}
