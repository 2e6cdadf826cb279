use dhub_event_bus::EventBus;
use dhub_jar::{JarSubsystem, ModuleDependency, ModuleIdentifier, ModuleService, module_service_name};
use dhub_kernel::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Server {
    dir: TempDir,
    controller: ModelController,
    manager: DeploymentManager,
}

impl Server {
    fn start() -> Self {
        let provider = Arc::new(DeploymentChainProvider::new());
        let services = ServiceContainer::new();
        let controller = ModelController::new(Arc::clone(&provider), services.clone());
        controller.register_subsystem(Arc::new(JarSubsystem));
        controller.execute(&Operation::add(PathAddress::subsystem("jar"), Value::Null)).unwrap();
        let manager = DeploymentManager::new(provider, services, EventBus::new());
        Self { dir: tempfile::tempdir().unwrap(), controller, manager }
    }

    fn jar(&self, name: &str, manifest: Option<&str>, entries: &[&str]) -> PathBuf {
        let root = self.dir.path().join(name);
        fs::create_dir_all(&root).unwrap();
        if let Some(manifest) = manifest {
            write(&root.join("META-INF/MANIFEST.MF"), manifest);
        }
        for entry in entries {
            write(&root.join(entry), "");
        }
        root
    }

    fn module(&self, name: &str) -> ServiceName {
        module_service_name(&DeploymentUnit::detached(name))
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_module_links_to_other_deployment() {
    let server = Server::start();
    let util = server.jar("util.jar", None, &["com/acme/Util.class"]);
    let app = server.jar(
        "app.jar",
        Some("Manifest-Version: 1.0\nClass-Path: lib/inner.jar util.jar\nDependencies: deployment.util.jar export, org.slf4j\n"),
        &["lib/inner.jar"],
    );

    server.manager.deploy_path(util).unwrap();
    let info = server.manager.deploy_path(app).unwrap();
    assert_eq!(info.chain, "jar");

    let services = server.controller.services();
    let module = services.value::<ModuleService>(&server.module("app.jar")).unwrap();
    let spec = module.specification();
    assert_eq!(spec.resource_roots(), ["lib/inner.jar"]);
    assert_eq!(
        spec.dependencies().iter().map(|d| d.module.to_string()).collect::<Vec<_>>(),
        ["deployment.util.jar", "org.slf4j"],
    );
    assert_eq!(module.identifier(), &ModuleIdentifier::Deployment("app.jar".into()));

    server.manager.undeploy("util.jar").unwrap();
    assert_eq!(services.state(&server.module("app.jar")), Some(ServiceState::Waiting));
}

#[test]
fn test_missing_required_module_fails_deployment() {
    let server = Server::start();
    let app = server.jar("app.jar", Some("Dependencies: deployment.absent.jar\n"), &[]);

    let err = server.manager.deploy_path(app).unwrap_err();

    assert!(matches!(err, DeploymentError::Verification { .. }), "{err}");
    assert!(server.controller.services().is_empty());
}

#[test]
fn test_missing_optional_module_is_skipped() {
    let server = Server::start();
    let app = server.jar("app.jar", Some("Dependencies: deployment.absent.jar optional\n"), &[]);

    server.manager.deploy_path(app).unwrap();

    let module = server.module("app.jar");
    assert_eq!(server.controller.services().state(&module), Some(ServiceState::Up));
    let spec = server.controller.services().value::<ModuleService>(&module).unwrap();
    assert_eq!(
        spec.specification().dependencies(),
        [ModuleDependency { module: ModuleIdentifier::Deployment("absent.jar".into()), optional: true, export: false }]
    );
}

#[test]
fn test_malformed_dependencies_header() {
    let server = Server::start();
    let app = server.jar("app.jar", Some("Dependencies: org.slf4j eager\n"), &[]);

    let err = server.manager.deploy_path(app).unwrap_err();

    assert!(matches!(err.root_cause(), DeploymentError::Descriptor { .. }), "{err}");
    assert_eq!(err.failed_priority(), Some(Phase::Dependencies.priority(slots::DEPENDENCIES_MODULE)));
}

#[test]
fn test_bundles_are_not_plain_jars() {
    let server = Server::start();
    let bundle = server.jar("bundle.jar", Some("Bundle-SymbolicName: com.acme.bundle\n"), &[]);

    let err = server.manager.deploy_path(bundle).unwrap_err();
    assert!(matches!(err, DeploymentError::NoChain { .. }), "{err}");
}

#[test]
fn test_removing_subsystem_unregisters_chain() {
    let server = Server::start();
    assert_eq!(server.controller.provider().chain("jar").map(|c| c.len()), Some(3));

    server.controller.execute(&Operation::remove(PathAddress::subsystem("jar"))).unwrap();

    assert!(server.controller.provider().is_empty());
    let err = server.manager.deploy_path(server.jar("late.jar", None, &[])).unwrap_err();
    assert!(matches!(err, DeploymentError::NoChain { .. }), "{err}");
}
