mod support;

use fleetswap_core::error::DeployError;
use fleetswap_core::provisioner::logging::LoggingOutcome;
use fleetswap_core::types::{ADD_TO_LOAD_BALANCER, Fleet, Role};

use support::{Harness, MASTER, monitoring_section, with_elastic_addresses};

fn tag(fleet: &Fleet, key: &str, h: &Harness) -> Option<String> {
    let group = h.cloud.group(&fleet.name)?;
    Fleet::tag_value(&group, key)
}

#[tokio::test(start_paused = true)]
async fn deploy_stands_up_qa_next_to_active() {
    let h = Harness::new();
    let active = h.seed("asg-shop-stage-1", "Active", 2);
    h.cloud.seed_load_balancer("shop-stage", &active.members());

    let mut lifecycle = h.lifecycle("").await;
    let report = lifecycle.deploy().await.unwrap();

    assert!(report.fleet.starts_with("asg-shop-stage-"));
    assert_ne!(report.fleet, active.name);
    assert_eq!(report.instances.len(), 2);
    assert_eq!(lifecycle.roles().holder(Role::Qa), Some(report.fleet.as_str()));
    assert_eq!(lifecycle.roles().holder(Role::Active), Some(active.name.as_str()));

    let qa = Fleet::from(h.cloud.group(&report.fleet).unwrap());
    assert_eq!(qa.tagged_role, Some(Role::Qa));
    assert_eq!(qa.environment.as_deref(), Some("stage"));
    assert_eq!(qa.suspended_processes, vec![ADD_TO_LOAD_BALANCER]);
    assert_eq!(tag(&qa, "Name", &h).as_deref(), Some("shop-stage"));
    assert!(h.cloud.launch_template_exists(&qa.launch_template));

    // The live fleet keeps serving alone.
    assert_eq!(tag(&active, "type", &h).as_deref(), Some("Active"));
    assert_eq!(
        h.cloud.load_balancer("shop-stage").unwrap().instances,
        active.members()
    );
}

#[tokio::test(start_paused = true)]
async fn qa_names_follow_member_order() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 2);

    let mut lifecycle = h.lifecycle("").await;
    let report = lifecycle.deploy().await.unwrap();

    assert_eq!(report.qa_bindings.len(), 2);
    for (binding, instance) in report.qa_bindings.iter().zip(&report.instances) {
        assert_eq!(&binding.instance, instance);
        assert_eq!(
            binding.names,
            vec![format!("qa{}.shop.example.", binding.slot)]
        );
        let dns = h.cloud.instance(instance).unwrap().public_dns.unwrap();
        assert_eq!(binding.address, dns);
        assert_eq!(
            h.cname_target(&binding.names[0]).as_deref(),
            Some(dns.as_str())
        );
    }
    assert_eq!(report.qa_bindings[0].slot, 1);
    assert_eq!(report.qa_bindings[1].slot, 2);

    // Production names are left alone until confirm.
    assert!(h.cloud.record("shop.example.").is_none());
}

#[tokio::test(start_paused = true)]
async fn scaling_policies_and_alarms_belong_to_the_new_fleet() {
    let h = Harness::new();
    let mut lifecycle = h.lifecycle("").await;
    let report = lifecycle.deploy().await.unwrap();

    let mut policies: Vec<String> = h.cloud.policies().into_iter().map(|p| p.name).collect();
    policies.sort();
    assert_eq!(
        policies,
        vec![
            format!("{}-scale-down", report.fleet),
            format!("{}-scale-up", report.fleet),
        ]
    );

    let up = h
        .cloud
        .alarm(&format!("{}-scale-up-alarm", report.fleet))
        .unwrap();
    assert_eq!(up.threshold, 50.0);
    assert_eq!(
        up.actions,
        vec![format!("arn:policy:{0}:{0}-scale-up", report.fleet)]
    );
    assert_eq!(
        up.dimensions.get("AutoScalingGroupName"),
        Some(&report.fleet)
    );
    assert!(
        h.cloud
            .alarm(&format!("{}-scale-down-alarm", report.fleet))
            .is_some()
    );
}

#[tokio::test(start_paused = true)]
async fn second_deploy_is_refused_without_side_effects() {
    let h = Harness::new();
    h.seed("asg-shop-stage-1", "Active", 2);
    h.seed("asg-shop-stage-2", "QA", 2);

    let mut lifecycle = h.lifecycle("").await;
    let groups = h.cloud.group_names();
    let calls = h.cloud.calls().len();

    let err = lifecycle.deploy().await.unwrap_err();
    assert!(matches!(err, DeployError::Precondition(_)), "{err}");
    assert!(err.to_string().contains("asg-shop-stage-2"));
    assert_eq!(h.cloud.group_names(), groups);
    assert_eq!(h.cloud.calls().len(), calls);
}

#[tokio::test(start_paused = true)]
async fn app_user_data_is_rendered_into_the_launch_template() {
    let h = Harness::new();
    h.write(
        "userdata/app.sh",
        "#!/bin/sh\necho {{ project }}-{{ environment }} > /etc/role\n",
    );

    let mut lifecycle = h
        .lifecycle("[user_data]\napp = \"userdata/app.sh\"\n")
        .await;
    let report = lifecycle.deploy().await.unwrap();

    let group = h.cloud.group(&report.fleet).unwrap();
    let template = h.cloud.launch_template(&group.launch_template).unwrap();
    assert_eq!(
        template.user_data,
        "#!/bin/sh\necho shop-stage > /etc/role\n"
    );
    assert_eq!(template.image_id, "ami-1234");
    assert_eq!(template.key_name, "shop-stage");
    assert_eq!(template.instance_profile, "shop-ec2-stage");
}

#[tokio::test(start_paused = true)]
async fn bootstrap_files_are_published_before_the_fleet() {
    let h = Harness::new();
    h.write(
        "bootstrap/nrpe.cfg.tmpl",
        "server={{ bootstrap_bucket }}\nenv={{environment}}\n",
    );
    let extra = r#"
[bootstrap]
bucket = "shop-artifacts"

[bootstrap.files]
"nrpe.cfg" = "bootstrap/nrpe.cfg.tmpl"
"#;

    let mut lifecycle = h.lifecycle(extra).await;
    let report = lifecycle.deploy().await.unwrap();

    assert_eq!(report.bootstrap_keys, vec!["stage/bootstrap/nrpe.cfg"]);
    let (contents, acl) = h
        .cloud
        .object("shop-artifacts", "stage/bootstrap/nrpe.cfg")
        .unwrap();
    assert_eq!(
        String::from_utf8(contents).unwrap(),
        "server=shop-artifacts\nenv=stage\n"
    );
    assert_eq!(acl, "authenticated-read");

    let calls = h.cloud.calls();
    let published = calls.iter().position(|c| c == "put_object").unwrap();
    let created = calls.iter().position(|c| c == "create_group").unwrap();
    assert!(published < created);
}

#[tokio::test(start_paused = true)]
async fn broken_bootstrap_template_stops_the_deploy() {
    let h = Harness::new();
    h.write("bootstrap/nrpe.cfg.tmpl", "server={{ nagios_server }}\n");
    let extra = r#"
[bootstrap]
bucket = "shop-artifacts"

[bootstrap.files]
"nrpe.cfg" = "bootstrap/nrpe.cfg.tmpl"
"#;

    let mut lifecycle = h.lifecycle(extra).await;
    let err = lifecycle.deploy().await.unwrap_err();
    assert!(err.to_string().contains("nagios_server"), "{err}");
    assert!(h.cloud.group_names().is_empty());
    assert_eq!(lifecycle.roles().holder(Role::Qa), None);
}

#[tokio::test(start_paused = true)]
async fn monitoring_gets_one_host_file_per_member() {
    let h = Harness::new();
    let mut lifecycle = h.lifecycle(monitoring_section()).await;
    let report = lifecycle.deploy().await.unwrap();

    let mut expected: Vec<String> = report
        .instances
        .iter()
        .map(|id| format!("/etc/nagios3/conf.d/shop-stage-{id}.cfg"))
        .collect();
    expected.sort();
    assert_eq!(h.cloud.remote_paths(MASTER), expected);

    let id = &report.instances[0];
    let dns = h.cloud.instance(id).unwrap().public_dns.unwrap();
    let file = h
        .cloud
        .remote_file(MASTER, &format!("/etc/nagios3/conf.d/shop-stage-{id}.cfg"))
        .unwrap();
    assert_eq!(
        file,
        format!("define host {{\n  use shop-servers\n  host_name shop-stage-{id}\n  address {dns}\n}}\n")
    );

    let commands: Vec<String> = h.cloud.commands().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        commands,
        vec![
            "sudo /etc/nagios/check_config".to_string(),
            "sudo /etc/init.d/nagios3 restart".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn live_environment_members_get_elastic_addresses() {
    let h = Harness::new();
    h.cloud.add_addresses(&["203.0.113.10", "203.0.113.11"]);

    let mut lifecycle = h.open(h.env_from(&with_elastic_addresses())).await.unwrap();
    let report = lifecycle.deploy().await.unwrap();

    assert_eq!(
        report.elastic_addresses,
        vec![
            (report.instances[0].clone(), "203.0.113.10".to_string()),
            (report.instances[1].clone(), "203.0.113.11".to_string()),
        ]
    );
    for address in h.cloud.addresses() {
        let holder = address.instance_id.unwrap();
        assert!(report.instances.contains(&holder));
    }
}

#[tokio::test(start_paused = true)]
async fn too_few_addresses_leaves_the_fleet_in_qa() {
    let h = Harness::new();
    h.cloud.add_addresses(&["203.0.113.10"]);

    let mut lifecycle = h.open(h.env_from(&with_elastic_addresses())).await.unwrap();
    let err = lifecycle.deploy().await.unwrap_err();

    assert!(
        matches!(
            err,
            DeployError::InsufficientAddresses {
                needed: 2,
                available: 1
            }
        ),
        "{err}"
    );
    assert!(h.cloud.addresses()[0].instance_id.is_none());
    let qa = lifecycle.roles().holder(Role::Qa).unwrap().to_string();
    assert!(h.cloud.group(&qa).is_some());
}

#[tokio::test(start_paused = true)]
async fn deploy_provisions_the_logging_instance() {
    let h = Harness::new();
    let extra = r#"
[logging]
ami_id = "ami-logger"
urls = ["logs.shop.example."]
volume_size_gb = 50
"#;

    let mut lifecycle = h.lifecycle(extra).await;
    let report = lifecycle.deploy().await.unwrap();

    let LoggingOutcome::Provisioned { instance, volume } = report.logging else {
        panic!("expected a new logging instance, got {:?}", report.logging);
    };
    let logger = h.cloud.instance(&instance).unwrap();
    assert_eq!(logger.tags.get("Name").map(String::as_str), Some("shop-logger"));
    assert_eq!(
        h.cname_target("logs.shop.example."),
        logger.public_dns.clone()
    );

    let volumes = h.cloud.volumes();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].id, volume);
    assert_eq!(volumes[0].attached_to.as_deref(), Some(instance.as_str()));
    assert!(!report.instances.contains(&instance));
}

#[tokio::test(start_paused = true)]
async fn fleet_that_fails_to_suspend_is_kept_in_qa_for_abort() {
    let h = Harness::new();
    let active = h.seed("asg-shop-stage-1", "Active", 2);
    h.cloud.seed_load_balancer("shop-stage", &active.members());
    let mut lifecycle = h.lifecycle("").await;
    h.cloud.inject_transient("suspend_processes", 1);

    let err = lifecycle.deploy().await.unwrap_err();
    assert!(err.is_transient(), "{err}");
    let orphan = lifecycle.roles().holder(Role::Qa).unwrap().to_string();
    assert_eq!(h.cloud.group_names(), vec!["asg-shop-stage-1".to_string(), orphan.clone()]);

    let err = lifecycle.deploy().await.unwrap_err();
    assert!(matches!(err, DeployError::Precondition(_)), "{err}");
    assert_eq!(h.cloud.group_names().len(), 2);

    let report = lifecycle.abort().await.unwrap();
    assert_eq!(report.fleet.as_deref(), Some(orphan.as_str()));
    assert_eq!(h.cloud.group_names(), vec!["asg-shop-stage-1"]);
    assert_eq!(
        h.cloud.load_balancer("shop-stage").unwrap().instances,
        active.members()
    );

    let redeployed = lifecycle.deploy().await.unwrap();
    assert_ne!(redeployed.fleet, orphan);
    assert_eq!(h.cloud.group_names().len(), 2);
}
