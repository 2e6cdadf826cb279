use dhub::domain::SubsystemSet;
use dhub::domain::config::ServerConfig;
use dhub::kernel::prelude::*;
use dhub::subsystems;
use std::sync::Arc;

fn controller() -> ModelController {
    ModelController::new(Arc::new(DeploymentChainProvider::new()), ServiceContainer::new())
}

#[test]
fn test_default_config_activates_everything() {
    let controller = controller();

    let activated = dhub::init(&ServerConfig::default(), &controller).unwrap();

    assert_eq!(activated, ["jar", "web", "ear"]);
    assert_eq!(controller.subsystems(), ["ear", "jar", "web"]);
    assert_eq!(controller.provider().chain_names(), ["jar", "web", "ear"]);
    assert!(controller.services().contains(&subsystems::web::host_service_name("default-host")));
}

#[test]
fn test_configured_subset_and_host() {
    let controller = controller();
    let mut config = ServerConfig::default();
    config.subsystems = SubsystemSet::WEB;
    config.web.default_host = "edge".to_owned();

    let activated = dhub::init(&config, &controller).unwrap();

    assert_eq!(activated, ["web"]);
    assert!(controller.is_active("web"));
    assert!(!controller.is_active("jar"), "registered but not added");
    assert_eq!(controller.provider().chain_names(), ["web"]);
    assert!(controller.services().contains(&subsystems::web::host_service_name("edge")));
}

#[test]
fn test_nothing_enabled() {
    let controller = controller();
    let mut config = ServerConfig::default();
    config.subsystems = SubsystemSet::empty();

    assert!(dhub::init(&config, &controller).unwrap().is_empty());
    assert!(controller.provider().is_empty());
    assert!(subsystems::is_enabled("ear"));
    assert!(!subsystems::is_enabled("rar"));
}
