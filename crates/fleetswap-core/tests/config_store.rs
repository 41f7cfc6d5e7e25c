use tempfile::TempDir;

use fleetswap_core::config::{ConfigStore, parse_fleetswap_toml_str};

const CONFIG: &str = r#"
project = "shop"
region = "eu-west-1"
zones = ["eu-west-1a", "eu-west-1b"]

[monitoring]
master_host = "nagios.shop.example"
config_dir = "/etc/nagios3/conf.d"
template = "nagios.cfg.tmpl"

[environments.live]
zone = "shop.example."
base_url = "shop.example."
urls = ["www.shop.example."]
qa_urls = ["qa{index}.shop.example."]
ami_image_id = "ami-1"
max_size = 4

[environments.stage]
zone = "shop.example."
base_url = "stage.shop.example."
ami_image_id = "ami-1"
"#;

#[test]
fn load_missing_config_explains_how_to_point_elsewhere() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_path(temp.path().join("fleetswap.toml"));

    let err = store.load().unwrap_err();
    assert!(err.to_string().contains("--config"));
}

#[test]
fn load_resolves_relative_paths_against_the_config_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("deploy");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("fleetswap.toml"), CONFIG).unwrap();
    let store = ConfigStore::from_path(dir.join("fleetswap.toml"));

    let loaded = store.load().unwrap();
    assert_eq!(loaded.project, "shop");
    assert_eq!(loaded.zones, vec!["eu-west-1a", "eu-west-1b"]);
    assert_eq!(loaded.environments.len(), 2);
    assert_eq!(loaded.environments["live"].max_size, 4);
    assert_eq!(
        loaded.monitoring.as_ref().unwrap().check_command,
        "sudo /etc/nagios/check_config"
    );
    assert_eq!(store.base_dir(), dir);

    let live = loaded.environment("live", &store.base_dir()).unwrap();
    assert_eq!(
        live.resolve_path(&live.monitoring.as_ref().unwrap().template),
        dir.join("nagios.cfg.tmpl")
    );
}

#[test]
fn production_environment_gets_elastic_addresses_by_default() {
    let temp = TempDir::new().unwrap();
    let config = parse_fleetswap_toml_str(CONFIG).unwrap();

    let live = config.environment("live", temp.path()).unwrap();
    let stage = config.environment("stage", temp.path()).unwrap();
    assert!(live.assign_elastic_addresses);
    assert!(!stage.assign_elastic_addresses);
    assert_eq!(live.load_balancer_name, "shop-live");
    assert_eq!(stage.security_groups, vec!["stage"]);
    assert_eq!(
        live.resolve_path(&live.monitoring.as_ref().unwrap().template),
        temp.path().join("nagios.cfg.tmpl")
    );
}

#[test]
fn invalid_environment_names_the_environment() {
    let broken = CONFIG.replace("max_size = 4", "max_size = 4\nmin_size = 5\ndesired_capacity = 5");
    let err = parse_fleetswap_toml_str(&broken).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("live"), "{message}");
    assert!(message.contains("min_size"), "{message}");
}
