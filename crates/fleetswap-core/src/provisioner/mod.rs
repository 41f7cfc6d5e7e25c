//! Creation and deletion of candidate fleets.

pub mod logging;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::{info, instrument, warn};

use crate::config::EnvironmentConfig;
use crate::error::{DeployError, ProviderError, Result};
use crate::naming::{ResourceNames, ScalingDirection, unique_stamp};
use crate::provider::{
    AlarmSpec, Cloud, Comparison, LaunchTemplateSpec, LoadBalancer, ScalingGroupSpec,
    ScalingPolicy, ScalingPolicySpec, ScheduledAction,
};
use crate::roles::RoleBook;
use crate::template;
use crate::types::{ADD_TO_LOAD_BALANCER, ENVIRONMENT_TAG, Fleet, NAME_TAG, Role};
use crate::wait::{self, WaitPolicy};

/// Name of the one-off action that shrinks a demoted fleet.
pub const SCALE_DOWN_ACTION: &str = "decrease-minimum-capacity";

/// Builds and tears down scaling groups for one environment.
#[derive(Debug, Clone)]
pub struct FleetProvisioner {
    cloud: Cloud,
    env: Arc<EnvironmentConfig>,
    names: ResourceNames,
    policy: WaitPolicy,
}

impl FleetProvisioner {
    pub fn new(cloud: Cloud, env: Arc<EnvironmentConfig>) -> Self {
        let names = ResourceNames::new(&env.project, &env.environment);
        let policy = WaitPolicy::new(env.poll_interval(), env.poll_timeout());
        Self {
            cloud,
            env,
            names,
            policy,
        }
    }

    fn app_user_data(&self) -> Result<String> {
        match &self.env.user_data.app {
            Some(path) => template::render_file(
                &self.env.resolve_path(path),
                &self.env.template_variables(),
            ),
            None => Ok(String::new()),
        }
    }

    /// Register a new, uniquely named launch template.
    pub async fn create_launch_template(&self, stamp: i64) -> Result<LaunchTemplateSpec> {
        let spec = LaunchTemplateSpec {
            name: self.names.launch_template(stamp),
            image_id: self.env.image_id.clone(),
            key_name: self.env.key_name.clone(),
            security_groups: self.env.security_groups.clone(),
            user_data: self.app_user_data()?,
            instance_type: self.env.instance_type.clone(),
            instance_profile: self.env.instance_profile.clone(),
        };
        info!(template = %spec.name, image = %spec.image_id, "creating launch template");
        self.cloud.scaling.create_launch_template(&spec).await?;
        Ok(spec)
    }

    /// Create a QA fleet behind `balancer` and wait for its first members.
    ///
    /// The group is recorded as QA as soon as it exists and automatic
    /// balancer registration is suspended right after; members are
    /// registered explicitly once the fleet is confirmed.
    #[instrument(skip_all, fields(environment = %self.env.environment))]
    pub async fn create_fleet(
        &self,
        balancer: &LoadBalancer,
        roles: &mut RoleBook,
    ) -> Result<Fleet> {
        let stamp = unique_stamp();
        let template = self.create_launch_template(stamp).await?;
        let name = self.names.scaling_group(stamp);

        info!(fleet = %name, balancer = %balancer.name, "creating scaling group");
        self.cloud
            .scaling
            .create_group(&ScalingGroupSpec {
                name: name.clone(),
                launch_template: template.name.clone(),
                load_balancers: vec![balancer.name.clone()],
                zones: self.env.zones.clone(),
                min_size: self.env.min_size,
                max_size: self.env.max_size,
                desired_capacity: self.env.desired_capacity,
                default_cooldown: self.env.default_cooldown,
            })
            .await?;

        // Recorded before anything else can fail so that abort finds it.
        roles.assign(Role::Qa, &name).await?;

        info!(fleet = %name, "suspending {}", ADD_TO_LOAD_BALANCER);
        self.cloud
            .scaling
            .suspend_processes(&name, &[ADD_TO_LOAD_BALANCER])
            .await?;

        roles
            .tags()
            .tag(&name, ENVIRONMENT_TAG, &self.env.environment, false)
            .await?;
        roles
            .tags()
            .tag(&name, NAME_TAG, &self.env.instance_name(), true)
            .await?;

        let up = self.create_scaling_policy(ScalingDirection::Up, &name).await?;
        let down = self
            .create_scaling_policy(ScalingDirection::Down, &name)
            .await?;
        self.create_scaling_alarm(&up, &name, ScalingDirection::Up)
            .await?;
        self.create_scaling_alarm(&down, &name, ScalingDirection::Down)
            .await?;

        info!(fleet = %name, "waiting on instances");
        let fleet =
            wait::fleet_has_members(self.cloud.scaling.as_ref(), self.policy, &name).await?;
        info!(fleet = %name, members = fleet.instances.len(), "fleet has members");
        Ok(fleet)
    }

    /// Create a capacity policy and read it back for its reference.
    pub async fn create_scaling_policy(
        &self,
        direction: ScalingDirection,
        group: &str,
    ) -> Result<ScalingPolicy> {
        let name = ResourceNames::policy(group, direction);
        let adjustment = match direction {
            ScalingDirection::Up => self.env.adjustment_up,
            ScalingDirection::Down => self.env.adjustment_down,
        };
        info!(policy = %name, adjustment, "creating scaling policy");
        self.cloud
            .scaling
            .put_scaling_policy(&ScalingPolicySpec {
                name: name.clone(),
                group: group.to_string(),
                adjustment,
                cooldown: self.env.default_cooldown,
            })
            .await?;

        let scaling = self.cloud.scaling.as_ref();
        let names = std::slice::from_ref(&name);
        wait::wait_until(self.policy, &format!("policy {name}"), || async move {
            let found = scaling.describe_policies(group, names).await?;
            Ok(found.into_iter().find(|p| p.name == names[0]))
        })
        .await
    }

    /// Bind a metric alarm on the group to `policy`.
    pub async fn create_scaling_alarm(
        &self,
        policy: &ScalingPolicy,
        group: &str,
        direction: ScalingDirection,
    ) -> Result<()> {
        let alarms = &self.env.alarms;
        let (comparison, threshold) = match direction {
            ScalingDirection::Up => (Comparison::GreaterThan, alarms.threshold_up),
            ScalingDirection::Down => (Comparison::LessThan, alarms.threshold_down),
        };
        let spec = AlarmSpec {
            name: ResourceNames::alarm(group, direction),
            namespace: alarms.namespace.clone(),
            metric: alarms.metric.clone(),
            statistic: alarms.statistic.clone(),
            comparison,
            threshold,
            period_seconds: alarms.period_seconds,
            evaluation_periods: alarms.evaluation_periods,
            actions: vec![policy.arn.clone()],
            dimensions: BTreeMap::from([(
                "AutoScalingGroupName".to_string(),
                group.to_string(),
            )]),
        };
        info!(alarm = %spec.name, threshold, "creating scaling alarm");
        self.cloud.alarms.put_alarm(&spec).await?;
        Ok(())
    }

    /// Shrink a demoted fleet to a single instance after the soak delay.
    pub async fn schedule_scale_down(&self, group: &str) -> Result<()> {
        let delay = self.env.cutover.scale_down_delay_seconds;
        let start_time = Utc::now() + TimeDelta::seconds(delay as i64);
        info!(fleet = group, %start_time, "scheduling scale down");
        self.cloud
            .scaling
            .put_scheduled_action(&ScheduledAction {
                group: group.to_string(),
                name: SCALE_DOWN_ACTION.to_string(),
                min_size: 1,
                desired_capacity: 1,
                start_time,
            })
            .await?;
        Ok(())
    }

    /// Terminate and delete the fleet holding the Old role.
    ///
    /// Removes its instances, scaling group, launch template and alarms, then
    /// releases the role. Fails unless `fleet` is the recorded Old fleet.
    #[instrument(skip_all, fields(fleet = %fleet.name))]
    pub async fn delete_fleet(&self, fleet: &Fleet, roles: &mut RoleBook) -> Result<()> {
        if roles.holder(Role::Old) != Some(fleet.name.as_str()) {
            return Err(DeployError::precondition(format!(
                "refusing to delete {}: only the Old fleet may be deleted (it holds {})",
                fleet.name,
                roles
                    .role_of(&fleet.name)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "no role".to_string())
            )));
        }

        info!("shutting down instances");
        ignore_missing(self.cloud.scaling.shutdown_group(&fleet.name).await)?;
        wait::fleet_drained(self.cloud.scaling.as_ref(), self.policy, &fleet.name).await?;

        info!("deleting scaling group");
        ignore_missing(self.cloud.scaling.delete_group(&fleet.name, true).await)?;

        info!(template = %fleet.launch_template, "deleting launch template");
        ignore_missing(
            self.cloud
                .scaling
                .delete_launch_template(&fleet.launch_template)
                .await,
        )?;

        self.cloud
            .alarms
            .delete_alarms(&ResourceNames::alarms_of(&fleet.name))
            .await?;

        roles.release(Role::Old)?;
        info!("fleet deleted");
        Ok(())
    }
}

/// Treat an already-deleted resource as done.
fn ignore_missing(result: std::result::Result<(), ProviderError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(ProviderError::NotFound(what)) => {
            warn!(%what, "already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
