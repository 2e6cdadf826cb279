use crate::host::WebContext;
use dhub_jar::module::RESOURCE_ROOTS;
use dhub_jar::module_service_name;
use dhub_kernel::DeploymentError;
use dhub_kernel::attachment::AttachmentKey;
use dhub_kernel::prelude::{DeploymentPhaseContext, DeploymentUnitProcessor, ServiceName};
use dhub_kernel::unit::DeploymentUnit;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const WEB_DESCRIPTOR: &str = "WEB-INF/web.xml";
const WEB_CLASSES: &str = "WEB-INF/classes";
const WEB_LIB: &str = "WEB-INF/lib";
const CONTEXT_PATH_HEADER: &str = "Web-ContextPath";
const ROOT_CONTEXT_NAME: &str = "ROOT";

pub const WAR_METADATA: AttachmentKey<WarMetadata> = AttachmentKey::new("war-metadata");
pub const CONTEXT_ROOT: AttachmentKey<String> = AttachmentKey::new("context-root");

/// What was found under `WEB-INF`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarMetadata {
    pub descriptor: bool,
    pub classes: bool,
    pub libraries: Vec<String>,
}

/// Discovers `WEB-INF` content and adds classes and libraries to the module's resource roots.
#[derive(Debug, Default)]
pub struct WarStructureProcessor;

impl DeploymentUnitProcessor for WarStructureProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit_mut();
        let metadata = unit.deployment_root().filter(|root| root.is_exploded()).map_or_else(WarMetadata::default, |root| {
            WarMetadata {
                descriptor: root.has_entry(WEB_DESCRIPTOR),
                classes: root.has_dir(WEB_CLASSES),
                libraries: root
                    .files_under(WEB_LIB)
                    .filter(|file| file.to_ascii_lowercase().ends_with(".jar"))
                    .map(str::to_owned)
                    .collect(),
            }
        });

        if metadata.classes {
            unit.attachments_mut().add_to_list(RESOURCE_ROOTS, WEB_CLASSES.to_owned());
        }
        for library in &metadata.libraries {
            unit.attachments_mut().add_to_list(RESOURCE_ROOTS, library.clone());
        }
        debug!(unit = unit.name(), descriptor = metadata.descriptor, libraries = metadata.libraries.len(), "Web structure");
        unit.attachments_mut().put(WAR_METADATA, metadata);
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) {
        unit.attachments_mut().remove(WAR_METADATA);
    }
}

/// Picks the context root: a configured override, then the manifest's
/// `Web-ContextPath`, then the archive name (`ROOT.war` maps to `/`).
#[derive(Debug, Default)]
pub struct ContextRootProcessor {
    overrides: BTreeMap<String, String>,
}

impl ContextRootProcessor {
    #[must_use]
    pub const fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    #[must_use]
    pub fn resolve(&self, unit: &DeploymentUnit) -> String {
        if let Some(root) = self.overrides.get(unit.name()) {
            return normalize(root);
        }
        if let Some(root) = unit.manifest().and_then(|m| m.get(CONTEXT_PATH_HEADER)) {
            return normalize(root);
        }
        let stem = Path::new(unit.name()).file_stem().map_or_else(|| unit.name().to_owned(), |s| s.to_string_lossy().into_owned());
        if stem == ROOT_CONTEXT_NAME { "/".to_owned() } else { normalize(&stem) }
    }
}

impl DeploymentUnitProcessor for ContextRootProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let context_root = self.resolve(ctx.unit());
        debug!(unit = ctx.unit().name(), %context_root, "Context root resolved");
        ctx.unit_mut().attachments_mut().put(CONTEXT_ROOT, context_root);
        Ok(())
    }

    fn undeploy(&self, unit: &mut DeploymentUnit) {
        unit.attachments_mut().remove(CONTEXT_ROOT);
    }
}

fn normalize(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    format!("/{trimmed}")
}

/// Installs the [`WebContext`] service on the configured host, after the module.
#[derive(Debug)]
pub struct WebContextInstallProcessor {
    host: ServiceName,
}

impl WebContextInstallProcessor {
    #[must_use]
    pub const fn new(host: ServiceName) -> Self {
        Self { host }
    }
}

impl DeploymentUnitProcessor for WebContextInstallProcessor {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        let unit = ctx.unit();
        let context_root = unit.attachments().get(CONTEXT_ROOT).cloned().ok_or_else(|| {
            DeploymentError::MissingAttachment {
                message: CONTEXT_ROOT.name().into(),
                context: Some(unit.name().to_owned().into()),
            }
        })?;

        let name = unit.service_name().append("context");
        let state = ctx
            .services()
            .add_service(name.clone(), WebContext::new(unit.name(), context_root.as_str(), self.host.clone()))
            .add_dependency(self.host.clone())
            .add_dependency(module_service_name(unit))
            .install()?;
        info!(unit = unit.name(), %context_root, service = %name, ?state, "Web context installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_root_resolution_order() {
        let overrides = BTreeMap::from([("shop.war".to_owned(), "store/".to_owned())]);
        let processor = ContextRootProcessor::new(overrides);

        assert_eq!(processor.resolve(&DeploymentUnit::detached("shop.war")), "/store");
        assert_eq!(processor.resolve(&DeploymentUnit::detached("blog.war")), "/blog");
        assert_eq!(processor.resolve(&DeploymentUnit::detached("ROOT.war")), "/");
        assert_eq!(normalize("/"), "/");
    }
}
