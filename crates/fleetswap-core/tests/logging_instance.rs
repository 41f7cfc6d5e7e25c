mod support;

use fleetswap_core::provider::ComputeApi;
use fleetswap_core::provisioner::logging::LoggingOutcome;

use support::Harness;

const LOGGING: &str = r#"
[user_data]
logging = "userdata/logger.sh"

[logging]
ami_id = "ami-logger"
urls = ["logs.shop.example.", "syslog.shop.example."]
"#;

fn provisioned(outcome: LoggingOutcome) -> (String, String) {
    match outcome {
        LoggingOutcome::Provisioned { instance, volume } => (instance, volume),
        other => panic!("expected a new logging instance, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn logging_instance_is_launched_once() {
    let h = Harness::new();
    h.write("userdata/logger.sh", "#!/bin/sh\nmount /dev/sda2 /var/log/{{ project }}\n");
    let lifecycle = h.lifecycle(LOGGING).await;

    let first = lifecycle.provision_logging().await.unwrap();
    assert!(first.bootstrap_keys.is_empty());
    let (instance, volume) = provisioned(first.outcome);

    let dns = h.cloud.instance(&instance).unwrap().public_dns.unwrap();
    assert_eq!(h.cname_target("logs.shop.example."), Some(dns.clone()));
    assert_eq!(h.cname_target("syslog.shop.example."), Some(dns));

    let volumes = h.cloud.volumes();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].id, volume);
    assert_eq!(volumes[0].zone, "zone-a");

    let second = lifecycle.provision_logging().await.unwrap();
    assert_eq!(second.outcome, LoggingOutcome::AlreadyRunning { instance });
    assert_eq!(h.cloud.running_instances().len(), 1);
    assert_eq!(h.cloud.calls().iter().filter(|c| *c == "run_instance").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn replacement_logger_takes_over_the_volume() {
    let h = Harness::new();
    h.write("userdata/logger.sh", "#!/bin/sh\n");
    let lifecycle = h.lifecycle(LOGGING).await;

    let (first, volume) = provisioned(lifecycle.provision_logging().await.unwrap().outcome);
    // Rename the old logger so it no longer counts as the running one.
    h.cloud.tag_instance(&first, "Name", "retired").await.unwrap();

    let (second, reused) = provisioned(lifecycle.provision_logging().await.unwrap().outcome);
    assert_ne!(first, second);
    assert_eq!(reused, volume);

    let volumes = h.cloud.volumes();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].attached_to.as_deref(), Some(second.as_str()));
    let calls = h.cloud.calls();
    assert_eq!(calls.iter().filter(|c| *c == "create_volume").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "detach_volume").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_logging_section_means_nothing_to_do() {
    let h = Harness::new();
    let lifecycle = h.lifecycle("").await;

    let report = lifecycle.provision_logging().await.unwrap();
    assert_eq!(report.outcome, LoggingOutcome::Disabled);
    assert!(h.cloud.calls().iter().all(|c| c != "run_instance"));
}

#[tokio::test(start_paused = true)]
async fn missing_logger_user_data_fails_before_launch() {
    let h = Harness::new();
    let lifecycle = h.lifecycle(LOGGING).await;

    let err = lifecycle.provision_logging().await.unwrap_err();
    assert!(err.to_string().contains("logger.sh"), "{err}");
    assert!(h.cloud.running_instances().is_empty());
}
