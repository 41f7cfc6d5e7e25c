//! Resource naming and tag conventions.
//!
//! Fleet-scoped resources (launch template, scaling group) carry a
//! millisecond stamp; policies and alarms are derived from the group name so
//! two fleets of one environment never share them.

pub mod tags;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

pub use tags::FleetTags;

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond stamp, strictly increasing within the process.
pub fn unique_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(seen) => last = seen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDirection {
    Up,
    Down,
}

impl ScalingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingDirection::Up => "up",
            ScalingDirection::Down => "down",
        }
    }
}

/// Names for every resource of one project environment.
#[derive(Debug, Clone)]
pub struct ResourceNames {
    project: String,
    environment: String,
}

impl ResourceNames {
    pub fn new(project: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
        }
    }

    pub fn launch_template(&self, stamp: i64) -> String {
        format!("lt-{}-{}-{}", self.project, self.environment, stamp)
    }

    pub fn scaling_group(&self, stamp: i64) -> String {
        format!("asg-{}-{}-{}", self.project, self.environment, stamp)
    }

    pub fn policy(group: &str, direction: ScalingDirection) -> String {
        format!("{}-scale-{}", group, direction.as_str())
    }

    pub fn alarm(group: &str, direction: ScalingDirection) -> String {
        format!("{}-scale-{}-alarm", group, direction.as_str())
    }

    /// Alarms created alongside a fleet.
    pub fn alarms_of(group: &str) -> Vec<String> {
        [ScalingDirection::Up, ScalingDirection::Down]
            .into_iter()
            .map(|direction| Self::alarm(group, direction))
            .collect()
    }

    /// Host name registered with the monitoring master.
    pub fn monitoring_host(&self, instance_id: &str) -> String {
        format!("{}-{}-{}", self.project, self.environment, instance_id)
    }

    /// Host definition file for one instance.
    pub fn monitoring_file(&self, config_dir: &str, instance_id: &str) -> String {
        format!(
            "{}/{}.cfg",
            config_dir.trim_end_matches('/'),
            self.monitoring_host(instance_id)
        )
    }

    /// Glob covering every host file of this environment.
    pub fn monitoring_glob(&self, config_dir: &str) -> String {
        format!(
            "{}/{}-{}-*",
            config_dir.trim_end_matches('/'),
            self.project,
            self.environment
        )
    }

    /// Object key of a bootstrap file.
    pub fn bootstrap_key(&self, file: &str) -> String {
        format!("{}/bootstrap/{}", self.environment, file.trim_start_matches('/'))
    }
}
