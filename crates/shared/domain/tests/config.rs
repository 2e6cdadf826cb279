use dhub_domain::config::{LoggingConfig, ScannerConfig, ServerConfig};
use dhub_domain::events::DeploymentEvent;
use dhub_domain::SubsystemSet;
use serde_json::json;

#[test]
fn config_defaults_are_sane() {
    let scanner = ScannerConfig::default();
    assert!(scanner.enabled);
    assert_eq!(scanner.path, std::path::PathBuf::from("deployments"));
    assert!(scanner.auto_deploy_archives);
    assert!(!scanner.auto_deploy_exploded);

    let logging = LoggingConfig::default();
    assert_eq!(logging.level, "info");
    assert!(logging.console);

    let cfg = ServerConfig::default();
    assert_eq!(cfg.subsystems, SubsystemSet::ALL);
    assert_eq!(cfg.web.default_host, "default-host");
}

#[test]
fn server_config_deserializes_partial_sections() {
    let raw = json!({
        "server": { "name": "node-a" },
        "scanner": { "path": "/srv/deployments", "interval_ms": 250 },
        "subsystems": "jar, web"
    });

    let cfg: ServerConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.server.name, "node-a");
    assert_eq!(cfg.scanner.path, std::path::PathBuf::from("/srv/deployments"));
    assert_eq!(cfg.scanner.interval_ms, 250);
    assert!(cfg.scanner.auto_deploy_archives, "unspecified fields keep defaults");
    assert_eq!(cfg.subsystems, SubsystemSet::JAR | SubsystemSet::WEB);
}

#[test]
fn subsystem_set_accepts_bits_and_names() {
    let from_bits: SubsystemSet = serde_json::from_value(json!(4)).unwrap();
    assert_eq!(from_bits, SubsystemSet::EAR);

    assert_eq!(SubsystemSet::from("*"), SubsystemSet::ALL);
    assert_eq!(SubsystemSet::from("bogus"), SubsystemSet::empty());
    assert_eq!((SubsystemSet::WEB | SubsystemSet::EAR).names(), vec!["web", "ear"]);
}

#[test]
fn deployment_event_serializes_tagged() {
    let event = DeploymentEvent::Failed { name: "app.war".into(), reason: "boom".into() };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value, json!({ "type": "failed", "name": "app.war", "reason": "boom" }));
    assert_eq!(event.name(), "app.war");
}
