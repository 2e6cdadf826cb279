use config::Map;
use dhub_domain::SubsystemSet;
use dhub_domain::config::ServerConfig;
use dhub_kernel::config::{ConfigError, load_config, load_config_with_env};
use std::fs;
use std::path::PathBuf;

const SERVER_TOML: &str = r#"
subsystems = "jar, web"

[scanner]
path = "/srv/deployments"
interval_ms = 1000

[web]
default_host = "edge"
"#;

fn env(pairs: &[(&str, &str)]) -> Map<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

#[test]
fn test_file_values_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");
    fs::write(&path, SERVER_TOML).unwrap();

    let config: ServerConfig = load_config_with_env(Some(&path), Some(Map::new())).unwrap();

    assert_eq!(config.scanner.path, PathBuf::from("/srv/deployments"));
    assert_eq!(config.scanner.interval_ms, 1000);
    assert!(config.scanner.auto_deploy_archives, "untouched keys keep their default");
    assert_eq!(config.web.default_host, "edge");
    assert_eq!(config.subsystems, SubsystemSet::JAR | SubsystemSet::WEB);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");
    fs::write(&path, SERVER_TOML).unwrap();

    let overrides = env(&[("DHUB__SCANNER__INTERVAL_MS", "250"), ("DHUB__SERVER__NAME", "node-2")]);
    let config: ServerConfig = load_config_with_env(Some(&path), Some(overrides)).unwrap();

    assert_eq!(config.scanner.interval_ms, 250);
    assert_eq!(config.server.name, "node-2");
    assert_eq!(config.web.default_host, "edge");
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result: Result<ServerConfig, ConfigError> = load_config(Some(dir.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::Config { .. })));
}

#[test]
fn test_without_file_defaults_apply() {
    let config: ServerConfig = load_config_with_env(None::<PathBuf>, Some(Map::new())).unwrap();

    assert_eq!(config.server.name, "dhub");
    assert_eq!(config.scanner.path, PathBuf::from("deployments"));
    assert_eq!(config.web.default_host, "default-host");
}

#[test]
fn test_environment_overrides_parse_scalars() {
    let overrides = env(&[
        ("DHUB__SCANNER__ENABLED", "false"),
        ("DHUB__SCANNER__AUTO_DEPLOY_EXPLODED", "true"),
        ("DHUB__LOGGING__MAX_FILES", "3"),
    ]);

    let config: ServerConfig = load_config_with_env(None::<PathBuf>, Some(overrides)).unwrap();

    assert!(!config.scanner.enabled);
    assert!(config.scanner.auto_deploy_exploded);
    assert_eq!(config.logging.max_files, 3);
}
