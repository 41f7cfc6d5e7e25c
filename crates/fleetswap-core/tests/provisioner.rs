mod support;

use fleetswap_core::error::DeployError;
use fleetswap_core::naming::FleetTags;
use fleetswap_core::provider::memory::InMemoryCloud;
use fleetswap_core::provider::{InstanceState, ScalingApi};
use fleetswap_core::provisioner::{FleetProvisioner, SCALE_DOWN_ACTION};
use fleetswap_core::roles::RoleBook;
use fleetswap_core::state::LedgerStore;
use fleetswap_core::types::Role;

use support::{ENVIRONMENT, Harness};

async fn parts(h: &Harness) -> (FleetProvisioner, RoleBook) {
    let cloud = h.cloud.cloud();
    let provisioner = FleetProvisioner::new(cloud.clone(), h.env(""));
    let tags = FleetTags::new(cloud.scaling, ENVIRONMENT);
    let roles = RoleBook::open(LedgerStore::new(h.state_dir(), "shop"), tags)
        .await
        .unwrap();
    (provisioner, roles)
}

#[tokio::test(start_paused = true)]
async fn only_the_old_fleet_may_be_deleted() {
    let h = Harness::new();
    let active = h.seed("asg-shop-stage-1", "Active", 2);
    let (provisioner, mut roles) = parts(&h).await;

    let err = provisioner
        .delete_fleet(&active, &mut roles)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Precondition(_)), "{err}");
    assert!(err.to_string().contains("Active"));
    assert!(h.cloud.group("asg-shop-stage-1").is_some());
    assert!(h.cloud.calls().iter().all(|c| c != "shutdown_group"));
}

#[tokio::test(start_paused = true)]
async fn deleting_the_old_fleet_removes_everything_it_owns() {
    let h = Harness::new();
    let old = h.seed("asg-shop-stage-1", "Old", 2);
    let (provisioner, mut roles) = parts(&h).await;

    provisioner.delete_fleet(&old, &mut roles).await.unwrap();

    assert!(h.cloud.group("asg-shop-stage-1").is_none());
    assert!(!h.cloud.launch_template_exists("lt-asg-shop-stage-1"));
    for id in old.members() {
        assert_eq!(h.cloud.instance(&id).unwrap().state, InstanceState::Terminated);
    }
    assert_eq!(roles.holder(Role::Old), None);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_half_deleted_fleet_finishes_the_job() {
    let h = Harness::new();
    let old = h.seed("asg-shop-stage-1", "Old", 1);
    let (provisioner, mut roles) = parts(&h).await;
    h.cloud
        .delete_launch_template("lt-asg-shop-stage-1")
        .await
        .unwrap();

    provisioner.delete_fleet(&old, &mut roles).await.unwrap();
    assert!(h.cloud.group_names().is_empty());
    assert_eq!(roles.holder(Role::Old), None);
}

#[tokio::test(start_paused = true)]
async fn scale_down_is_scheduled_after_the_delay() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Inactive", 2);
    let (provisioner, _roles) = parts(&h).await;

    let before = chrono::Utc::now();
    provisioner
        .schedule_scale_down("asg-shop-stage-1")
        .await
        .unwrap();

    let actions = h.cloud.scheduled_actions();
    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.group, "asg-shop-stage-1");
    assert_eq!(action.name, SCALE_DOWN_ACTION);
    assert_eq!(action.min_size, 1);
    assert_eq!(action.desired_capacity, 1);
    assert!(action.start_time >= before + chrono::TimeDelta::seconds(30));
}

#[tokio::test(start_paused = true)]
async fn fleet_that_never_gets_members_times_out() {
    let h = Harness::with_cloud(InMemoryCloud::new().with_boot_ticks(10_000));
    let mut lifecycle = h.lifecycle("").await;

    let err = lifecycle.deploy().await.unwrap_err();
    match err {
        DeployError::Timeout { what, .. } => assert!(what.starts_with("members of asg-shop-stage-")),
        other => panic!("unexpected error: {other}"),
    }
    // The half-built fleet stays in QA so it can be aborted.
    assert!(lifecycle.roles().holder(Role::Qa).is_some());
}
