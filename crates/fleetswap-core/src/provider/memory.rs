//! In-memory cloud implementing every collaborator trait.
//!
//! Provisioning is simulated as eventually consistent: a new group reports no
//! members until it has been described a few times, and new instances stay
//! pending (without an address) for the same number of polls. Suitable for
//! tests and dry runs; nothing is persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    AlarmApi, AlarmSpec, ArtifactStore, Cloud, CommandOutput, ComputeApi, DnsApi, ElasticAddress,
    HealthCheck, InstanceHealth, InstanceInfo, InstanceState, LaunchTemplateSpec, LoadBalancer,
    LoadBalancerApi, LoadBalancerSpec, ProviderResult, RecordChange, RemoteExec, RunInstanceSpec,
    ScalingApi, ScalingGroup, ScalingGroupSpec, ScalingPolicy, ScalingPolicySpec, ScheduledAction,
    Tag, VolumeInfo, VolumeSpec, VolumeStatus,
};
use crate::error::ProviderError;

#[derive(Debug, Default)]
struct MemoryState {
    launch_templates: BTreeMap<String, LaunchTemplateSpec>,
    groups: BTreeMap<String, MemoryGroup>,
    policies: Vec<ScalingPolicy>,
    scheduled: Vec<ScheduledAction>,
    instances: BTreeMap<String, MemoryInstance>,
    addresses: Vec<ElasticAddress>,
    volumes: BTreeMap<String, MemoryVolume>,
    load_balancers: BTreeMap<String, MemoryBalancer>,
    zones: BTreeMap<String, BTreeMap<String, RecordChange>>,
    alarms: BTreeMap<String, AlarmSpec>,
    objects: BTreeMap<(String, String), (Vec<u8>, String)>,
    remote_files: BTreeMap<(String, String), String>,
    commands: Vec<(String, String)>,
    failing_commands: Vec<(String, u32)>,
    faults: BTreeMap<String, u32>,
    calls: Vec<String>,
    next_id: u64,
}

#[derive(Debug)]
struct MemoryGroup {
    group: ScalingGroup,
    /// Describes left before members show up
    ticks_until_members: u32,
}

#[derive(Debug)]
struct MemoryInstance {
    info: InstanceInfo,
    ticks_until_running: u32,
}

#[derive(Debug)]
struct MemoryVolume {
    info: VolumeInfo,
    name: String,
    ticks_until_available: u32,
}

#[derive(Debug)]
struct MemoryBalancer {
    balancer: LoadBalancer,
    tags: Vec<Tag>,
}

/// Simulated cloud account.
#[derive(Debug)]
pub struct InMemoryCloud {
    state: Mutex<MemoryState>,
    boot_ticks: u32,
    balancer_tags_supported: bool,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            boot_ticks: 1,
            balancer_tags_supported: true,
        }
    }

    /// Number of polls a new group/instance/volume stays unsettled.
    pub fn with_boot_ticks(mut self, ticks: u32) -> Self {
        self.boot_ticks = ticks;
        self
    }

    pub fn without_balancer_tags(mut self) -> Self {
        self.balancer_tags_supported = false;
        self
    }

    /// Collaborator bundle backed by this cloud.
    pub fn cloud(self: &Arc<Self>) -> Cloud {
        Cloud {
            scaling: self.clone(),
            compute: self.clone(),
            load_balancers: self.clone(),
            dns: self.clone(),
            alarms: self.clone(),
            artifacts: self.clone(),
            remote: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, op: &str) -> ProviderResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.calls.push(op.to_string());
        if let Some(remaining) = state.faults.get_mut(op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ProviderError::Transient(format!("{op} throttled")));
        }
        Ok(state)
    }

    // --- seeding and inspection helpers ---

    /// Fail the next `times` calls of `op` with a transient error.
    pub fn inject_transient(&self, op: &str, times: u32) {
        self.lock().faults.insert(op.to_string(), times);
    }

    /// Make the next `times` commands containing `needle` exit non-zero.
    pub fn fail_commands_matching(&self, needle: &str, times: u32) {
        self.lock()
            .failing_commands
            .push((needle.to_string(), times));
    }

    /// Create a settled fleet with running members and role/environment tags.
    pub fn seed_fleet(&self, name: &str, environment: &str, role: &str, members: u32) -> ScalingGroup {
        let mut state = self.lock();
        let template = format!("lt-{name}");
        state.launch_templates.insert(
            template.clone(),
            LaunchTemplateSpec {
                name: template.clone(),
                image_id: "ami-seed".into(),
                key_name: "seed".into(),
                security_groups: vec![],
                user_data: String::new(),
                instance_type: "t2.micro".into(),
                instance_profile: "seed".into(),
            },
        );
        let mut instances = Vec::new();
        for _ in 0..members {
            let id = state.allocate_instance(0, BTreeMap::new());
            instances.push(id);
        }
        let group = ScalingGroup {
            name: name.to_string(),
            launch_template: template,
            load_balancers: vec![],
            min_size: members,
            max_size: members,
            desired_capacity: members,
            tags: vec![
                Tag {
                    key: "type".into(),
                    value: role.into(),
                    propagate_at_launch: false,
                },
                Tag {
                    key: "env".into(),
                    value: environment.into(),
                    propagate_at_launch: false,
                },
            ],
            instances,
            suspended_processes: vec![],
        };
        state.groups.insert(
            name.to_string(),
            MemoryGroup {
                group: group.clone(),
                ticks_until_members: 0,
            },
        );
        group
    }

    /// Create a load balancer with the given members already registered.
    pub fn seed_load_balancer(&self, name: &str, instances: &[String]) -> LoadBalancer {
        let balancer = LoadBalancer {
            name: name.to_string(),
            dns_name: format!("{name}.elb.example.com"),
            hosted_zone_id: "ZELB".into(),
            instances: instances.to_vec(),
            health_check: Some(HealthCheck::standard()),
        };
        self.lock().load_balancers.insert(
            name.to_string(),
            MemoryBalancer {
                balancer: balancer.clone(),
                tags: vec![],
            },
        );
        balancer
    }

    pub fn add_addresses(&self, ips: &[&str]) {
        let mut state = self.lock();
        for ip in ips {
            state.addresses.push(ElasticAddress {
                public_ip: ip.to_string(),
                allocation_id: Some(format!("eipalloc-{ip}")),
                instance_id: None,
            });
        }
    }

    pub fn group(&self, name: &str) -> Option<ScalingGroup> {
        self.lock().groups.get(name).map(|g| g.group.clone())
    }

    pub fn group_names(&self) -> Vec<String> {
        self.lock().groups.keys().cloned().collect()
    }

    pub fn launch_template_exists(&self, name: &str) -> bool {
        self.lock().launch_templates.contains_key(name)
    }

    pub fn launch_template(&self, name: &str) -> Option<LaunchTemplateSpec> {
        self.lock().launch_templates.get(name).cloned()
    }

    pub fn instance(&self, id: &str) -> Option<InstanceInfo> {
        self.lock().instances.get(id).map(|i| i.info.clone())
    }

    pub fn load_balancer(&self, name: &str) -> Option<LoadBalancer> {
        self.lock()
            .load_balancers
            .get(name)
            .map(|b| b.balancer.clone())
    }

    pub fn load_balancer_tags(&self, name: &str) -> Vec<Tag> {
        self.lock()
            .load_balancers
            .get(name)
            .map(|b| b.tags.clone())
            .unwrap_or_default()
    }

    /// Record target for `name` across all zones.
    pub fn record(&self, name: &str) -> Option<RecordChange> {
        self.lock()
            .zones
            .values()
            .find_map(|records| records.get(name).cloned())
    }

    pub fn addresses(&self) -> Vec<ElasticAddress> {
        self.lock().addresses.clone()
    }

    pub fn alarm_names(&self) -> Vec<String> {
        self.lock().alarms.keys().cloned().collect()
    }

    pub fn alarm(&self, name: &str) -> Option<AlarmSpec> {
        self.lock().alarms.get(name).cloned()
    }

    pub fn policies(&self) -> Vec<ScalingPolicy> {
        self.lock().policies.clone()
    }

    pub fn scheduled_actions(&self) -> Vec<ScheduledAction> {
        self.lock().scheduled.clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn remote_file(&self, host: &str, path: &str) -> Option<String> {
        self.lock()
            .remote_files
            .get(&(host.to_string(), path.to_string()))
            .cloned()
    }

    pub fn remote_paths(&self, host: &str) -> Vec<String> {
        self.lock()
            .remote_files
            .keys()
            .filter(|(h, _)| h == host)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.lock().commands.clone()
    }

    pub fn volumes(&self) -> Vec<VolumeInfo> {
        self.lock().volumes.values().map(|v| v.info.clone()).collect()
    }

    pub fn running_instances(&self) -> Vec<InstanceInfo> {
        self.lock()
            .instances
            .values()
            .filter(|i| i.info.state == InstanceState::Running)
            .map(|i| i.info.clone())
            .collect()
    }

    /// Every provider call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

impl MemoryState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn allocate_instance(&mut self, ticks: u32, tags: BTreeMap<String, String>) -> String {
        let n = self.next();
        let id = format!("i-{n:08x}");
        let settled = ticks == 0;
        self.instances.insert(
            id.clone(),
            MemoryInstance {
                info: InstanceInfo {
                    id: id.clone(),
                    state: if settled {
                        InstanceState::Running
                    } else {
                        InstanceState::Pending
                    },
                    public_dns: settled.then(|| format!("ec2-{n:08x}.compute.example.com")),
                    public_ip: None,
                    zone: Some("zone-a".into()),
                    tags,
                },
                ticks_until_running: ticks,
            },
        );
        id
    }

    fn group_mut(&mut self, name: &str) -> ProviderResult<&mut MemoryGroup> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("scaling group {name}")))
    }

    fn balancer_mut(&mut self, name: &str) -> ProviderResult<&mut MemoryBalancer> {
        self.load_balancers
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("load balancer {name}")))
    }

    /// Advance a group towards having members.
    fn tick_group(&mut self, name: &str, boot_ticks: u32) {
        let Some(entry) = self.groups.get_mut(name) else {
            return;
        };
        if entry.ticks_until_members > 0 {
            entry.ticks_until_members -= 1;
            if entry.ticks_until_members == 0 {
                let desired = entry.group.desired_capacity;
                let mut ids = Vec::new();
                for _ in 0..desired {
                    ids.push(self.allocate_instance(boot_ticks, BTreeMap::new()));
                }
                if let Some(entry) = self.groups.get_mut(name) {
                    entry.group.instances.extend(ids);
                }
            }
        }
    }
}

fn matches_glob(pattern: &str, path: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            path.len() >= prefix.len() + suffix.len()
                && path.starts_with(prefix)
                && path.ends_with(suffix)
        }
        None => pattern == path,
    }
}

#[async_trait]
impl ScalingApi for InMemoryCloud {
    async fn create_launch_template(&self, spec: &LaunchTemplateSpec) -> ProviderResult<()> {
        let mut state = self.enter("create_launch_template")?;
        if state.launch_templates.contains_key(&spec.name) {
            return Err(ProviderError::Api(format!(
                "launch template {} already exists",
                spec.name
            )));
        }
        state.launch_templates.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_launch_template(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.enter("delete_launch_template")?;
        state
            .launch_templates
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("launch template {name}")))
    }

    async fn create_group(&self, spec: &ScalingGroupSpec) -> ProviderResult<()> {
        let mut state = self.enter("create_group")?;
        if state.groups.contains_key(&spec.name) {
            return Err(ProviderError::Api(format!("group {} already exists", spec.name)));
        }
        if !state.launch_templates.contains_key(&spec.launch_template) {
            return Err(ProviderError::NotFound(format!(
                "launch template {}",
                spec.launch_template
            )));
        }
        let group = ScalingGroup {
            name: spec.name.clone(),
            launch_template: spec.launch_template.clone(),
            load_balancers: spec.load_balancers.clone(),
            min_size: spec.min_size,
            max_size: spec.max_size,
            desired_capacity: spec.desired_capacity,
            tags: vec![],
            instances: vec![],
            suspended_processes: vec![],
        };
        state.groups.insert(
            spec.name.clone(),
            MemoryGroup {
                group,
                ticks_until_members: self.boot_ticks.max(1),
            },
        );
        Ok(())
    }

    async fn describe_groups(&self) -> ProviderResult<Vec<ScalingGroup>> {
        let mut state = self.enter("describe_groups")?;
        let names: Vec<String> = state.groups.keys().cloned().collect();
        for name in &names {
            state.tick_group(name, self.boot_ticks);
        }
        Ok(state.groups.values().map(|g| g.group.clone()).collect())
    }

    async fn describe_group(&self, name: &str) -> ProviderResult<Option<ScalingGroup>> {
        let mut state = self.enter("describe_group")?;
        state.tick_group(name, self.boot_ticks);
        Ok(state.groups.get(name).map(|g| g.group.clone()))
    }

    async fn create_or_update_tags(&self, group: &str, tags: &[Tag]) -> ProviderResult<()> {
        let mut state = self.enter("create_or_update_tags")?;
        let entry = state.group_mut(group)?;
        for tag in tags {
            entry.group.tags.retain(|existing| existing.key != tag.key);
            entry.group.tags.push(tag.clone());
        }
        Ok(())
    }

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()> {
        let mut state = self.enter("suspend_processes")?;
        let entry = state.group_mut(group)?;
        for process in processes {
            if !entry.group.suspended_processes.iter().any(|p| p == process) {
                entry.group.suspended_processes.push(process.to_string());
            }
        }
        Ok(())
    }

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> ProviderResult<()> {
        let mut state = self.enter("resume_processes")?;
        let entry = state.group_mut(group)?;
        entry
            .group
            .suspended_processes
            .retain(|p| !processes.contains(&p.as_str()));
        Ok(())
    }

    async fn put_scaling_policy(&self, spec: &ScalingPolicySpec) -> ProviderResult<()> {
        let mut state = self.enter("put_scaling_policy")?;
        state.group_mut(&spec.group)?;
        let arn = format!("arn:policy:{}:{}", spec.group, spec.name);
        state
            .policies
            .retain(|p| !(p.group == spec.group && p.name == spec.name));
        state.policies.push(ScalingPolicy {
            name: spec.name.clone(),
            group: spec.group.clone(),
            arn,
            adjustment: spec.adjustment,
        });
        Ok(())
    }

    async fn describe_policies(
        &self,
        group: &str,
        names: &[String],
    ) -> ProviderResult<Vec<ScalingPolicy>> {
        let state = self.enter("describe_policies")?;
        Ok(state
            .policies
            .iter()
            .filter(|p| p.group == group && names.contains(&p.name))
            .cloned()
            .collect())
    }

    async fn put_scheduled_action(&self, action: &ScheduledAction) -> ProviderResult<()> {
        let mut state = self.enter("put_scheduled_action")?;
        state.group_mut(&action.group)?;
        state
            .scheduled
            .retain(|a| !(a.group == action.group && a.name == action.name));
        state.scheduled.push(action.clone());
        Ok(())
    }

    async fn shutdown_group(&self, group: &str) -> ProviderResult<()> {
        let mut state = self.enter("shutdown_group")?;
        let entry = state.group_mut(group)?;
        entry.group.min_size = 0;
        entry.group.desired_capacity = 0;
        entry.ticks_until_members = 0;
        let members = std::mem::take(&mut entry.group.instances);
        for id in members {
            if let Some(instance) = state.instances.get_mut(&id) {
                instance.info.state = InstanceState::Terminated;
            }
            for balancer in state.load_balancers.values_mut() {
                balancer.balancer.instances.retain(|i| i != &id);
            }
            for address in state.addresses.iter_mut() {
                if address.instance_id.as_deref() == Some(id.as_str()) {
                    address.instance_id = None;
                }
            }
        }
        Ok(())
    }

    async fn delete_group(&self, group: &str, force: bool) -> ProviderResult<()> {
        let mut state = self.enter("delete_group")?;
        let entry = state.group_mut(group)?;
        if !force && !entry.group.instances.is_empty() {
            return Err(ProviderError::Api(format!("group {group} still has instances")));
        }
        state.groups.remove(group);
        state.policies.retain(|p| p.group != group);
        state.scheduled.retain(|a| a.group != group);
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for InMemoryCloud {
    async fn describe_instance(&self, id: &str) -> ProviderResult<Option<InstanceInfo>> {
        let mut state = self.enter("describe_instance")?;
        let Some(instance) = state.instances.get_mut(id) else {
            return Ok(None);
        };
        if instance.ticks_until_running > 0 {
            instance.ticks_until_running -= 1;
            if instance.ticks_until_running == 0 && instance.info.state == InstanceState::Pending {
                instance.info.state = InstanceState::Running;
                let suffix = id.trim_start_matches("i-");
                instance.info.public_dns = Some(format!("ec2-{suffix}.compute.example.com"));
            }
        }
        Ok(Some(instance.info.clone()))
    }

    async fn find_running_by_name(&self, name: &str) -> ProviderResult<Vec<InstanceInfo>> {
        let state = self.enter("find_running_by_name")?;
        Ok(state
            .instances
            .values()
            .filter(|i| i.info.state == InstanceState::Running)
            .filter(|i| i.info.tags.get("Name").map(String::as_str) == Some(name))
            .map(|i| i.info.clone())
            .collect())
    }

    async fn run_instance(&self, _spec: &RunInstanceSpec) -> ProviderResult<InstanceInfo> {
        let mut state = self.enter("run_instance")?;
        let id = state.allocate_instance(self.boot_ticks, BTreeMap::new());
        Ok(state.instances[&id].info.clone())
    }

    async fn tag_instance(&self, id: &str, key: &str, value: &str) -> ProviderResult<()> {
        let mut state = self.enter("tag_instance")?;
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(format!("instance {id}")))?;
        instance.info.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn describe_addresses(&self) -> ProviderResult<Vec<ElasticAddress>> {
        let state = self.enter("describe_addresses")?;
        Ok(state.addresses.clone())
    }

    async fn associate_address(
        &self,
        instance: &str,
        address: &ElasticAddress,
    ) -> ProviderResult<()> {
        let mut state = self.enter("associate_address")?;
        if !state.instances.contains_key(instance) {
            return Err(ProviderError::NotFound(format!("instance {instance}")));
        }
        let slot = state
            .addresses
            .iter_mut()
            .find(|a| a.public_ip == address.public_ip)
            .ok_or_else(|| ProviderError::NotFound(format!("address {}", address.public_ip)))?;
        slot.instance_id = Some(instance.to_string());
        let ip = slot.public_ip.clone();
        if let Some(target) = state.instances.get_mut(instance) {
            target.info.public_ip = Some(ip);
        }
        Ok(())
    }

    async fn find_volumes_by_name(&self, name: &str) -> ProviderResult<Vec<VolumeInfo>> {
        let state = self.enter("find_volumes_by_name")?;
        Ok(state
            .volumes
            .values()
            .filter(|v| v.name == name)
            .map(|v| v.info.clone())
            .collect())
    }

    async fn describe_volume(&self, id: &str) -> ProviderResult<Option<VolumeInfo>> {
        let mut state = self.enter("describe_volume")?;
        let Some(volume) = state.volumes.get_mut(id) else {
            return Ok(None);
        };
        if volume.ticks_until_available > 0 {
            volume.ticks_until_available -= 1;
            if volume.ticks_until_available == 0 && volume.info.attached_to.is_none() {
                volume.info.status = VolumeStatus::Available;
            }
        }
        Ok(Some(volume.info.clone()))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> ProviderResult<VolumeInfo> {
        let mut state = self.enter("create_volume")?;
        let n = state.next();
        let info = VolumeInfo {
            id: format!("vol-{n:08x}"),
            status: VolumeStatus::Creating,
            attached_to: None,
            zone: spec.zone.clone(),
        };
        state.volumes.insert(
            info.id.clone(),
            MemoryVolume {
                info: info.clone(),
                name: spec.name.clone(),
                ticks_until_available: self.boot_ticks.max(1),
            },
        );
        Ok(info)
    }

    async fn attach_volume(&self, volume: &str, instance: &str, _device: &str) -> ProviderResult<()> {
        let mut state = self.enter("attach_volume")?;
        let entry = state
            .volumes
            .get_mut(volume)
            .ok_or_else(|| ProviderError::NotFound(format!("volume {volume}")))?;
        if entry.info.status != VolumeStatus::Available {
            return Err(ProviderError::Api(format!("volume {volume} is not available")));
        }
        entry.info.status = VolumeStatus::InUse;
        entry.info.attached_to = Some(instance.to_string());
        Ok(())
    }

    async fn detach_volume(&self, volume: &str) -> ProviderResult<()> {
        let mut state = self.enter("detach_volume")?;
        let entry = state
            .volumes
            .get_mut(volume)
            .ok_or_else(|| ProviderError::NotFound(format!("volume {volume}")))?;
        entry.info.attached_to = None;
        entry.ticks_until_available = self.boot_ticks.max(1);
        Ok(())
    }

    async fn security_group_ids(&self, names: &[String]) -> ProviderResult<Vec<String>> {
        let _state = self.enter("security_group_ids")?;
        Ok(names.iter().map(|n| format!("sg-{n}")).collect())
    }
}

#[async_trait]
impl LoadBalancerApi for InMemoryCloud {
    async fn describe(&self, name: &str) -> ProviderResult<Option<LoadBalancer>> {
        let state = self.enter("describe_load_balancer")?;
        Ok(state.load_balancers.get(name).map(|b| b.balancer.clone()))
    }

    async fn create(&self, spec: &LoadBalancerSpec) -> ProviderResult<LoadBalancer> {
        let mut state = self.enter("create_load_balancer")?;
        if state.load_balancers.contains_key(&spec.name) {
            return Err(ProviderError::Api(format!(
                "load balancer {} already exists",
                spec.name
            )));
        }
        let balancer = LoadBalancer {
            name: spec.name.clone(),
            dns_name: format!("{}.elb.example.com", spec.name),
            hosted_zone_id: "ZELB".into(),
            instances: vec![],
            health_check: None,
        };
        state.load_balancers.insert(
            spec.name.clone(),
            MemoryBalancer {
                balancer: balancer.clone(),
                tags: vec![],
            },
        );
        Ok(balancer)
    }

    async fn configure_health_check(&self, name: &str, check: &HealthCheck) -> ProviderResult<()> {
        let mut state = self.enter("configure_health_check")?;
        state.balancer_mut(name)?.balancer.health_check = Some(check.clone());
        Ok(())
    }

    async fn register_instances(&self, name: &str, instances: &[String]) -> ProviderResult<()> {
        let mut state = self.enter("register_instances")?;
        let balancer = &mut state.balancer_mut(name)?.balancer;
        for id in instances {
            if !balancer.instances.contains(id) {
                balancer.instances.push(id.clone());
            }
        }
        Ok(())
    }

    async fn deregister_instances(&self, name: &str, instances: &[String]) -> ProviderResult<()> {
        let mut state = self.enter("deregister_instances")?;
        let balancer = &mut state.balancer_mut(name)?.balancer;
        balancer.instances.retain(|id| !instances.contains(id));
        Ok(())
    }

    async fn instance_health(
        &self,
        name: &str,
        instances: &[String],
    ) -> ProviderResult<Vec<(String, InstanceHealth)>> {
        let state = self.enter("instance_health")?;
        let balancer = state
            .load_balancers
            .get(name)
            .ok_or_else(|| ProviderError::NotFound(format!("load balancer {name}")))?;
        Ok(instances
            .iter()
            .map(|id| {
                let registered = balancer.balancer.instances.contains(id);
                let running = state
                    .instances
                    .get(id)
                    .map(|i| i.info.state == InstanceState::Running)
                    .unwrap_or(false);
                let health = match (registered, running) {
                    (true, true) => InstanceHealth::InService,
                    (true, false) => InstanceHealth::OutOfService,
                    (false, _) => InstanceHealth::Unknown,
                };
                (id.clone(), health)
            })
            .collect())
    }

    async fn add_tags(&self, name: &str, tags: &[Tag]) -> ProviderResult<()> {
        let mut state = self.enter("add_load_balancer_tags")?;
        if !self.balancer_tags_supported {
            return Err(ProviderError::Unsupported("load balancer tags".into()));
        }
        let balancer = state.balancer_mut(name)?;
        for tag in tags {
            balancer.tags.retain(|t| t.key != tag.key);
            balancer.tags.push(tag.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DnsApi for InMemoryCloud {
    async fn zone_id(&self, zone: &str) -> ProviderResult<String> {
        let mut state = self.enter("zone_id")?;
        let id = format!("Z-{}", zone.trim_end_matches('.'));
        state.zones.entry(id.clone()).or_default();
        Ok(id)
    }

    async fn commit(&self, zone_id: &str, changes: &[RecordChange]) -> ProviderResult<()> {
        let mut state = self.enter("dns_commit")?;
        let records = state
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| ProviderError::NotFound(format!("hosted zone {zone_id}")))?;
        for change in changes {
            records.insert(change.name().to_string(), change.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl AlarmApi for InMemoryCloud {
    async fn put_alarm(&self, spec: &AlarmSpec) -> ProviderResult<()> {
        let mut state = self.enter("put_alarm")?;
        state.alarms.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ProviderResult<()> {
        let mut state = self.enter("delete_alarms")?;
        for name in names {
            state.alarms.remove(name);
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryCloud {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        contents: &[u8],
        acl: &str,
    ) -> ProviderResult<()> {
        let mut state = self.enter("put_object")?;
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            (contents.to_vec(), acl.to_string()),
        );
        Ok(())
    }
}

#[async_trait]
impl RemoteExec for InMemoryCloud {
    async fn run(&self, host: &str, command: &str) -> ProviderResult<CommandOutput> {
        let mut state = self.enter("remote_run")?;
        state.commands.push((host.to_string(), command.to_string()));
        let mut exit_code = 0;
        for (needle, remaining) in state.failing_commands.iter_mut() {
            if *remaining > 0 && command.contains(needle.as_str()) {
                *remaining -= 1;
                exit_code = 1;
                break;
            }
        }
        Ok(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "simulated failure".to_string()
            },
        })
    }

    async fn upload(&self, host: &str, path: &str, contents: &str) -> ProviderResult<()> {
        let mut state = self.enter("remote_upload")?;
        state
            .remote_files
            .insert((host.to_string(), path.to_string()), contents.to_string());
        Ok(())
    }

    async fn remove(&self, host: &str, pattern: &str) -> ProviderResult<()> {
        let mut state = self.enter("remote_remove")?;
        let doomed: BTreeSet<(String, String)> = state
            .remote_files
            .keys()
            .filter(|(h, p)| h == host && matches_glob(pattern, p))
            .cloned()
            .collect();
        for key in doomed {
            state.remote_files.remove(&key);
        }
        Ok(())
    }
}
