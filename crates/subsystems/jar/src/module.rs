use crate::error::JarError;
use dhub_kernel::attachment::{AttachmentKey, AttachmentList};
use dhub_kernel::prelude::{Service, ServiceError, ServiceName, StartContext};
use dhub_kernel::unit::DeploymentUnit;
use std::fmt;
use tracing::debug;

/// Entries of the unit (relative, `/`-separated) that belong on its module's class path.
/// Other subsystems add to this list during [`Phase::Parse`](dhub_kernel::prelude::Phase::Parse).
pub const RESOURCE_ROOTS: AttachmentList<String> = AttachmentList::new("resource-roots");

/// Dependencies gathered before the module specification is assembled.
pub const MODULE_DEPENDENCIES: AttachmentList<ModuleDependency> = AttachmentList::new("module-dependencies");

pub const MODULE_SPECIFICATION: AttachmentKey<ModuleSpecification> = AttachmentKey::new("module-specification");

const DEPLOYMENT_PREFIX: &str = "deployment.";

/// Name of a module: another deployment's (`deployment.<name>`) or one provided by the server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleIdentifier {
    Deployment(String),
    System(String),
}

impl ModuleIdentifier {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.strip_prefix(DEPLOYMENT_PREFIX) {
            Some(deployment) if !deployment.is_empty() => Self::Deployment(deployment.to_owned()),
            _ => Self::System(name.to_owned()),
        }
    }

    /// Module service to depend on. System modules are always available and have none.
    #[must_use]
    pub fn service_name(&self) -> Option<ServiceName> {
        match self {
            Self::Deployment(name) => Some(DeploymentUnit::top_level_service_name(name).append("module")),
            Self::System(_) => None,
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployment(name) => write!(f, "{DEPLOYMENT_PREFIX}{name}"),
            Self::System(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDependency {
    pub module: ModuleIdentifier,
    /// Missing optional modules are skipped instead of blocking the deployment.
    pub optional: bool,
    /// Re-exported to modules depending on this one.
    pub export: bool,
}

impl ModuleDependency {
    #[must_use]
    pub const fn new(module: ModuleIdentifier) -> Self {
        Self { module, optional: false, export: false }
    }

    /// Parses a `Dependencies` manifest header: comma-separated module names, each
    /// optionally followed by the flags `optional`, `export` or `services`.
    ///
    /// # Errors
    /// Returns [`JarError::Dependency`] for unknown flags.
    pub fn parse_header(header: &str) -> Result<Vec<Self>, JarError> {
        let mut dependencies = Vec::new();
        for spec in header.split(',').map(str::trim).filter(|spec| !spec.is_empty()) {
            let mut tokens = spec.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            let mut dependency = Self::new(ModuleIdentifier::parse(name));
            for flag in tokens {
                match flag {
                    "optional" => dependency.optional = true,
                    "export" => dependency.export = true,
                    "services" => {},
                    other => {
                        return Err(JarError::Dependency {
                            message: format!("unknown flag '{other}' for module {name}").into(),
                            context: Some(header.to_owned().into()),
                        });
                    },
                }
            }
            dependencies.push(dependency);
        }
        Ok(dependencies)
    }
}

/// Everything needed to build a deployment's module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSpecification {
    resource_roots: Vec<String>,
    dependencies: Vec<ModuleDependency>,
}

impl ModuleSpecification {
    #[must_use]
    pub const fn new(resource_roots: Vec<String>, dependencies: Vec<ModuleDependency>) -> Self {
        Self { resource_roots, dependencies }
    }

    #[must_use]
    pub fn resource_roots(&self) -> &[String] {
        &self.resource_roots
    }

    #[must_use]
    pub fn dependencies(&self) -> &[ModuleDependency] {
        &self.dependencies
    }

    /// Dependencies on other deployments' modules.
    pub fn deployment_dependencies(&self) -> impl Iterator<Item = &ModuleDependency> {
        self.dependencies.iter().filter(|dep| matches!(dep.module, ModuleIdentifier::Deployment(_)))
    }
}

/// The running module of a deployment.
#[derive(Debug)]
pub struct ModuleService {
    identifier: ModuleIdentifier,
    specification: ModuleSpecification,
}

impl ModuleService {
    #[must_use]
    pub fn new(unit: &DeploymentUnit, specification: ModuleSpecification) -> Self {
        let name = match unit.parent() {
            Some(parent) => format!("{parent}.{}", unit.name()),
            None => unit.name().to_owned(),
        };
        Self { identifier: ModuleIdentifier::Deployment(name), specification }
    }

    #[must_use]
    pub const fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    #[must_use]
    pub const fn specification(&self) -> &ModuleSpecification {
        &self.specification
    }
}

impl Service for ModuleService {
    fn start(&self, ctx: &StartContext<'_>) -> Result<(), ServiceError> {
        // Only declared (present) dependencies were wired; each must be a module.
        for dependency in self.specification.deployment_dependencies() {
            let Some(name) = dependency.module.service_name() else { continue };
            match ctx.dependency::<Self>(&name) {
                Ok(module) => debug!(module = %self.identifier, dependency = %module.identifier, "Module linked"),
                Err(_) if dependency.optional => {},
                Err(err) => return Err(err),
            }
        }
        debug!(module = %self.identifier, roots = self.specification.resource_roots.len(), "Module started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dependencies_header() {
        let deps = ModuleDependency::parse_header("org.slf4j, deployment.util.jar optional export,, com.acme services").unwrap();

        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0], ModuleDependency::new(ModuleIdentifier::System("org.slf4j".into())));
        assert_eq!(deps[1].module, ModuleIdentifier::Deployment("util.jar".into()));
        assert!(deps[1].optional && deps[1].export);
        assert_eq!(deps[1].module.to_string(), "deployment.util.jar");
        assert!(deps[2].module.service_name().is_none());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let err = ModuleDependency::parse_header("org.slf4j lazy").unwrap_err();
        assert!(err.to_string().contains("lazy"), "{err}");
    }

    #[test]
    fn test_deployment_module_service_name() {
        let module = ModuleIdentifier::parse("deployment.util.jar");
        let unit = DeploymentUnit::detached("util.jar");
        assert_eq!(module.service_name(), Some(unit.service_name().append("module")));
        assert_eq!(ModuleIdentifier::parse("deployment."), ModuleIdentifier::System("deployment.".into()));
    }
}
