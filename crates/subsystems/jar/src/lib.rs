//! Plain JAR deployments.
//!
//! Registers the `jar` chain and the module processors every archive type
//! shares: `Class-Path` resolution, the `Dependencies` header and the module
//! service. Other subsystems add the module processors to their own chains with
//! [`register_module_processors`].

mod error;
pub mod module;
mod processors;

pub use crate::error::{JarError, JarErrorExt};
pub use crate::module::{ModuleDependency, ModuleIdentifier, ModuleService, ModuleSpecification};
pub use crate::processors::{
    ManifestClassPathProcessor, ModuleDependenciesProcessor, ModuleInstallProcessor, module_service_name,
};

use dhub_kernel::operation::{DeploymentProcessorTarget, OperationError, Subsystem};
use dhub_kernel::prelude::{ArchiveSelector, DeploymentChain, Phase, slots};
use serde_json::Value;
use std::sync::Arc;

pub const SUBSYSTEM: &str = dhub_kernel::domain::subsystems::JAR;
pub const CHAIN: &str = "jar";

/// Adds the module processors to the chain named `chain`.
///
/// # Errors
/// Returns [`OperationError::NotFound`] when the chain is not registered.
pub fn register_module_processors(
    target: &mut DeploymentProcessorTarget,
    chain: &str,
) -> Result<(), OperationError> {
    target.add_deployment_processor(
        chain,
        Phase::Parse,
        slots::PARSE_MANIFEST_CLASS_PATH,
        Arc::new(ManifestClassPathProcessor),
    )?;
    target.add_deployment_processor(
        chain,
        Phase::Dependencies,
        slots::DEPENDENCIES_MODULE,
        Arc::new(ModuleDependenciesProcessor),
    )?;
    target.add_deployment_processor(chain, Phase::Install, slots::INSTALL_MODULE, Arc::new(ModuleInstallProcessor))
}

#[derive(Debug, Default)]
pub struct JarSubsystem;

impl Subsystem for JarSubsystem {
    fn name(&self) -> &'static str {
        SUBSYSTEM
    }

    fn activate(&self, _model: &Value, target: &mut DeploymentProcessorTarget) -> Result<(), OperationError> {
        target.add_deployment_chain(Arc::new(DeploymentChain::new(CHAIN)), Arc::new(ArchiveSelector::jar()), None);
        register_module_processors(target, CHAIN)?;
        tracing::info!("Jar subsystem activated");
        Ok(())
    }
}
