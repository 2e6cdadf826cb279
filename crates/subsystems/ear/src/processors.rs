use dhub_jar::module::RESOURCE_ROOTS;
use dhub_jar::module_service_name;
use dhub_kernel::DeploymentError;
use dhub_kernel::attachment::AttachmentKey;
use dhub_kernel::prelude::{DeploymentPhaseContext, DeploymentUnitProcessor, Service, ServiceError, StartContext};
use dhub_kernel::unit::{DeploymentUnit, SUB_DEPLOYMENTS};
use tracing::{debug, info};

pub const APPLICATION_DESCRIPTOR: &str = "META-INF/application.xml";
/// Jars here are shared by every module of the application.
pub const LIBRARY_DIRECTORY: &str = "lib";
const MODULE_EXTENSIONS: [&str; 2] = [".war", ".jar"];

pub const EAR_METADATA: AttachmentKey<EarMetadata> = AttachmentKey::new("ear-metadata");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarMetadata {
    pub descriptor: bool,
    pub modules: Vec<String>,
    pub libraries: Vec<String>,
}

fn is_module(entry: &str) -> bool {
    let entry = entry.to_ascii_lowercase();
    MODULE_EXTENSIONS.iter().any(|ext| entry.ends_with(ext))
}

/// Turns top-level `.war` and `.jar` entries into sub-deployments and puts
/// `lib/*.jar` on the application module's class path. Archive roots are
/// opaque and yield no modules.
#[derive(Debug, Default)]
pub struct EarStructureProcessor;

impl DeploymentUnitProcessor for EarStructureProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit_mut();
        let Some(root) = unit.deployment_root().filter(|root| root.is_exploded()) else {
            debug!(unit = unit.name(), "Archived application, no modules discovered");
            unit.attachments_mut().put(EAR_METADATA, EarMetadata::default());
            return Ok(());
        };

        let mut modules: Vec<String> = root.top_level().filter(|entry| is_module(entry)).map(str::to_owned).collect();
        modules.sort();
        let libraries: Vec<String> = root
            .files_under(LIBRARY_DIRECTORY)
            .filter(|file| !file[LIBRARY_DIRECTORY.len() + 1..].contains('/') && is_module(file))
            .map(str::to_owned)
            .collect();
        let descriptor = root.has_entry(APPLICATION_DESCRIPTOR);

        for module in &modules {
            let child = unit.sub_deployment(module)?;
            unit.attachments_mut().add_to_list(SUB_DEPLOYMENTS, child);
        }
        for library in &libraries {
            unit.attachments_mut().add_to_list(RESOURCE_ROOTS, library.clone());
        }

        info!(unit = unit.name(), modules = ?modules, libraries = libraries.len(), "Application structure discovered");
        unit.attachments_mut().put(EAR_METADATA, EarMetadata { descriptor, modules, libraries });
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) {
        unit.attachments_mut().take_list(SUB_DEPLOYMENTS);
        unit.attachments_mut().remove(EAR_METADATA);
    }
}

/// A running enterprise application.
#[derive(Debug)]
pub struct Application {
    name: String,
    modules: Vec<String>,
}

impl Application {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn modules(&self) -> &[String] {
        &self.modules
    }
}

impl Service for Application {
    fn start(&self, _ctx: &StartContext<'_>) -> Result<(), ServiceError> {
        info!(application = %self.name, modules = self.modules.len(), "Application started");
        Ok(())
    }

    fn stop(&self) {
        info!(application = %self.name, "Application stopped");
    }
}

/// Installs the [`Application`] service once the application module is installed.
#[derive(Debug, Default)]
pub struct ApplicationInstallProcessor;

impl DeploymentUnitProcessor for ApplicationInstallProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit();
        let modules = unit.attachments().get(EAR_METADATA).map(|meta| meta.modules.clone()).unwrap_or_default();
        let name = unit.service_name().append("application");

        ctx.services()
            .add_service(name, Application { name: unit.name().to_owned(), modules })
            .add_dependency(module_service_name(unit))
            .install()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_entries() {
        assert!(is_module("shop.war"));
        assert!(is_module("EJB.JAR"));
        assert!(!is_module("connector.rar"));
        assert!(!is_module("lib"));
    }
}
