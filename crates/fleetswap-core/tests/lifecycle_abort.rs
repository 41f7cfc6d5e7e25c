mod support;

use fleetswap_core::config::QA_SENTINEL;
use fleetswap_core::error::DeployError;
use fleetswap_core::types::{Fleet, Role};

use support::{Harness, MASTER, monitoring_section};

#[tokio::test(start_paused = true)]
async fn abort_returns_to_the_previous_state() {
    let h = Harness::new();
    let active = h.seed("asg-shop-stage-1", "Active", 2);
    h.cloud.seed_load_balancer("shop-stage", &active.members());

    let mut lifecycle = h.lifecycle(monitoring_section()).await;
    let deployed = lifecycle.deploy().await.unwrap();
    let group = h.cloud.group(&deployed.fleet).unwrap();

    let report = lifecycle.abort().await.unwrap();
    assert_eq!(report.fleet.as_deref(), Some(deployed.fleet.as_str()));
    assert_eq!(report.deleted, vec![deployed.fleet.clone()]);

    assert_eq!(h.cloud.group_names(), vec!["asg-shop-stage-1"]);
    assert!(!h.cloud.launch_template_exists(&group.launch_template));
    assert!(h.cloud.alarm_names().is_empty());
    assert!(h.cloud.policies().is_empty());
    assert!(h.cloud.remote_paths(MASTER).is_empty());
    assert_eq!(h.cname_target("qa1.shop.example.").as_deref(), Some(QA_SENTINEL));
    assert_eq!(h.cname_target("qa2.shop.example.").as_deref(), Some(QA_SENTINEL));

    let roles = lifecycle.roles();
    assert_eq!(roles.holder(Role::Active), Some("asg-shop-stage-1"));
    assert_eq!(roles.holder(Role::Qa), None);
    assert_eq!(roles.holder(Role::Old), None);

    let survivor = Fleet::from(h.cloud.group("asg-shop-stage-1").unwrap());
    assert_eq!(survivor.tagged_role, Some(Role::Active));
    assert_eq!(survivor.members(), active.members());
    assert_eq!(
        h.cloud.load_balancer("shop-stage").unwrap().instances,
        active.members()
    );
}

#[tokio::test(start_paused = true)]
async fn abort_then_deploy_again() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 1);

    let mut lifecycle = h.lifecycle("").await;
    let first = lifecycle.deploy().await.unwrap();
    lifecycle.abort().await.unwrap();
    let second = lifecycle.deploy().await.unwrap();

    assert_ne!(first.fleet, second.fleet);
    assert_eq!(lifecycle.roles().holder(Role::Qa), Some(second.fleet.as_str()));
}

#[tokio::test(start_paused = true)]
async fn abort_without_qa_is_refused() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 1);

    let mut lifecycle = h.lifecycle("").await;
    let err = lifecycle.abort().await.unwrap_err();
    assert!(matches!(err, DeployError::Precondition(_)), "{err}");
    assert_eq!(h.cloud.group_names(), vec!["asg-shop-stage-1"]);
}

#[tokio::test(start_paused = true)]
async fn abort_finishes_an_old_fleet_left_by_confirm() {
    let h = Harness::new();
    let original = h.seed("asg-shop-stage-1", "Active", 2);
    h.cloud.seed_load_balancer("shop-stage", &original.members());

    let mut lifecycle = h.lifecycle("").await;
    let promoted = lifecycle.deploy().await.unwrap();
    h.cloud.inject_transient("delete_group", 1);
    lifecycle.confirm().await.unwrap_err();
    assert_eq!(lifecycle.roles().holder(Role::Old), Some("asg-shop-stage-1"));

    let candidate = lifecycle.deploy().await.unwrap();
    let report = lifecycle.abort().await.unwrap();

    assert_eq!(report.fleet.as_deref(), Some(candidate.fleet.as_str()));
    assert_eq!(
        report.deleted,
        vec!["asg-shop-stage-1".to_string(), candidate.fleet.clone()]
    );
    assert_eq!(h.cloud.group_names(), vec![promoted.fleet.clone()]);
    assert_eq!(
        lifecycle.roles().holder(Role::Active),
        Some(promoted.fleet.as_str())
    );
    assert_eq!(
        h.cloud.load_balancer("shop-stage").unwrap().instances,
        promoted.instances
    );
}

#[tokio::test(start_paused = true)]
async fn interrupted_abort_is_finished_by_running_it_again() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 1);

    let mut lifecycle = h.lifecycle("").await;
    let deployed = lifecycle.deploy().await.unwrap();
    h.cloud.inject_transient("delete_group", 1);

    let err = lifecycle.abort().await.unwrap_err();
    assert!(err.is_transient(), "{err}");
    assert_eq!(lifecycle.roles().holder(Role::Qa), None);
    assert_eq!(
        lifecycle.roles().holder(Role::Old),
        Some(deployed.fleet.as_str())
    );

    let report = lifecycle.abort().await.unwrap();
    assert_eq!(report.fleet, None);
    assert_eq!(report.deleted, vec![deployed.fleet.clone()]);
    assert_eq!(h.cloud.group_names(), vec!["asg-shop-stage-1"]);
    assert_eq!(lifecycle.roles().holder(Role::Old), None);
}

#[tokio::test(start_paused = true)]
async fn abort_leaves_other_roles_alone() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 1);
    h.seed("asg-shop-stage-2", "Inactive", 1);
    h.seed("asg-shop-stage-3", "QA", 1);

    let mut lifecycle = h.lifecycle("").await;
    lifecycle.abort().await.unwrap();

    assert_eq!(
        h.cloud.group_names(),
        vec!["asg-shop-stage-1", "asg-shop-stage-2"]
    );
    assert_eq!(lifecycle.roles().holder(Role::Active), Some("asg-shop-stage-1"));
    assert_eq!(
        lifecycle.roles().holder(Role::Inactive),
        Some("asg-shop-stage-2")
    );
}
