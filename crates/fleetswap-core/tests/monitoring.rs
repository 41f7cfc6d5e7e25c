mod support;

use fleetswap_core::error::DeployError;
use fleetswap_core::monitoring::MonitoringPusher;
use fleetswap_core::provider::RemoteExec;

use support::{Harness, MASTER, monitoring_section};

const CHECK: &str = "sudo /etc/nagios/check_config";
const RESTART: &str = "sudo /etc/init.d/nagios3 restart";

fn pusher(h: &Harness) -> MonitoringPusher {
    MonitoringPusher::new(h.cloud.cloud(), h.env(monitoring_section()))
}

fn commands(h: &Harness) -> Vec<String> {
    h.cloud
        .commands()
        .into_iter()
        .map(|(host, command)| {
            assert_eq!(host, MASTER);
            command
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn push_then_remove_leaves_no_files() {
    let h = Harness::new();
    let fleet = h.seed("asg-shop-stage-1", "QA", 2);
    let monitoring = pusher(&h);

    monitoring.push_config(&fleet).await.unwrap();
    assert_eq!(h.cloud.remote_paths(MASTER).len(), 2);

    monitoring.remove_config(&fleet).await.unwrap();
    assert!(h.cloud.remote_paths(MASTER).is_empty());
    assert_eq!(commands(&h), vec![CHECK, RESTART, CHECK, RESTART]);
}

#[tokio::test(start_paused = true)]
async fn other_environments_keep_their_files() {
    let h = Harness::new();
    let fleet = h.seed("asg-shop-stage-1", "QA", 1);
    let monitoring = pusher(&h);
    monitoring.push_config(&fleet).await.unwrap();

    // A host file of another environment on the same master.
    h.cloud
        .upload(MASTER, "/etc/nagios3/conf.d/shop-live-i-ffffffff.cfg", "define host {}\n")
        .await
        .unwrap();
    h.cloud.fail_commands_matching("check_config", 1);

    let err = monitoring.push_config(&fleet).await.unwrap_err();
    match err {
        DeployError::ConfigCheck { host, detail } => {
            assert_eq!(host, MASTER);
            assert!(detail.contains("restarted"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        h.cloud.remote_paths(MASTER),
        vec!["/etc/nagios3/conf.d/shop-live-i-ffffffff.cfg"]
    );
    assert_eq!(commands(&h).last().map(String::as_str), Some(RESTART));
}

#[tokio::test(start_paused = true)]
async fn persistent_check_failure_does_not_restart() {
    let h = Harness::new();
    let fleet = h.seed("asg-shop-stage-1", "QA", 1);
    h.cloud.fail_commands_matching("check_config", 2);

    let err = pusher(&h).push_config(&fleet).await.unwrap_err();
    match err {
        DeployError::ConfigCheck { detail, .. } => {
            assert!(detail.contains("not restarted"), "{detail}");
            assert!(detail.contains("simulated failure"), "{detail}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(commands(&h), vec![CHECK, CHECK]);
    assert!(h.cloud.remote_paths(MASTER).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unconfigured_monitoring_is_skipped() {
    let h = Harness::new();
    let fleet = h.seed("asg-shop-stage-1", "QA", 1);
    let monitoring = MonitoringPusher::new(h.cloud.cloud(), h.env(""));

    monitoring.push_config(&fleet).await.unwrap();
    monitoring.remove_config(&fleet).await.unwrap();
    assert!(h.cloud.commands().is_empty());
}
