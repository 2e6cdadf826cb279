use crate::error::JarErrorExt;
use crate::module::{
    MODULE_DEPENDENCIES, MODULE_SPECIFICATION, ModuleDependency, ModuleIdentifier, ModuleService,
    ModuleSpecification, RESOURCE_ROOTS,
};
use dhub_kernel::DeploymentError;
use dhub_kernel::prelude::{DeploymentPhaseContext, DeploymentUnitProcessor, ServiceName};
use dhub_kernel::unit::{DeploymentUnit, Manifest};
use tracing::{debug, info, warn};

const DEPENDENCIES_HEADER: &str = "Dependencies";

/// Service name of the module installed for `unit`.
#[must_use]
pub fn module_service_name(unit: &DeploymentUnit) -> ServiceName {
    unit.service_name().append("module")
}

/// Resolves manifest `Class-Path` entries.
///
/// Entries inside the unit become resource roots. For top-level units, an entry
/// naming a file next to the unit becomes a dependency on that deployment's module.
#[derive(Debug, Default)]
pub struct ManifestClassPathProcessor;

impl DeploymentUnitProcessor for ManifestClassPathProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit_mut();
        let entries = unit.manifest().map(Manifest::class_path).unwrap_or_default();

        for entry in entries {
            let entry = entry.trim_start_matches("./").to_owned();
            if unit.has_entry(&entry) {
                unit.attachments_mut().add_to_list(RESOURCE_ROOTS, entry);
                continue;
            }

            let sibling = unit.root().parent().map(|dir| dir.join(&entry));
            if unit.parent().is_none() && !entry.contains('/') && sibling.is_some_and(|path| path.exists()) {
                debug!(unit = unit.name(), deployment = %entry, "Class-Path names a sibling deployment");
                let dependency = ModuleDependency::new(ModuleIdentifier::Deployment(entry));
                unit.attachments_mut().add_to_list(MODULE_DEPENDENCIES, dependency);
            } else {
                warn!(unit = unit.name(), entry = %entry, "Class-Path entry not found, ignoring");
            }
        }
        Ok(())
    }
}

/// Assembles the [`ModuleSpecification`] from the `Dependencies` header and
/// everything earlier processors contributed.
#[derive(Debug, Default)]
pub struct ModuleDependenciesProcessor;

impl DeploymentUnitProcessor for ModuleDependenciesProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit_mut();
        let declared = match unit.manifest().and_then(|m| m.get(DEPENDENCIES_HEADER)) {
            Some(header) => ModuleDependency::parse_header(header).context(unit.name().to_owned())?,
            None => Vec::new(),
        };

        let attachments = unit.attachments_mut();
        let mut dependencies: Vec<ModuleDependency> = Vec::new();
        for dependency in attachments.take_list(MODULE_DEPENDENCIES).into_iter().chain(declared) {
            if !dependencies.iter().any(|known| known.module == dependency.module) {
                dependencies.push(dependency);
            }
        }
        let mut resource_roots: Vec<String> = Vec::new();
        for root in attachments.take_list(RESOURCE_ROOTS) {
            if !resource_roots.contains(&root) {
                resource_roots.push(root);
            }
        }

        debug!(unit = unit.name(), roots = resource_roots.len(), dependencies = dependencies.len(), "Module specified");
        unit.attachments_mut().put(MODULE_SPECIFICATION, ModuleSpecification::new(resource_roots, dependencies));
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) {
        unit.attachments_mut().remove(MODULE_SPECIFICATION);
    }
}

/// Installs the [`ModuleService`] under the unit's service name. Deployment
/// dependencies become service dependencies; optional ones only when installed.
#[derive(Debug, Default)]
pub struct ModuleInstallProcessor;

impl DeploymentUnitProcessor for ModuleInstallProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit();
        let specification = unit.attachments().get(MODULE_SPECIFICATION).cloned().ok_or_else(|| {
            DeploymentError::MissingAttachment {
                message: MODULE_SPECIFICATION.name().into(),
                context: Some(unit.name().to_owned().into()),
            }
        })?;

        let services = ctx.services();
        let dependencies: Vec<ServiceName> = specification
            .deployment_dependencies()
            .filter_map(|dep| dep.module.service_name().map(|name| (dep.optional, name)))
            .filter(|(optional, name)| !optional || services.contains(name))
            .map(|(_, name)| name)
            .collect();

        let name = module_service_name(unit);
        let state = services
            .add_service(name.clone(), ModuleService::new(unit, specification))
            .add_dependencies(dependencies)
            .install()?;
        info!(unit = unit.name(), service = %name, ?state, "Module service installed");
        Ok(())
    }
}
