//! EAR deployments: module discovery and the application service.
//!
//! Discovered `.war` and `.jar` modules are deployed as sub-deployments after
//! the application itself, through whichever chains support them.

mod processors;

pub use crate::processors::{
    APPLICATION_DESCRIPTOR, Application, ApplicationInstallProcessor, EAR_METADATA, EarMetadata,
    EarStructureProcessor, LIBRARY_DIRECTORY,
};

use dhub_kernel::operation::{DeploymentProcessorTarget, OperationError, Subsystem};
use dhub_kernel::prelude::{ArchiveSelector, DeploymentChain, Phase, slots};
use serde_json::Value;
use std::sync::Arc;

pub const SUBSYSTEM: &str = dhub_kernel::domain::subsystems::EAR;
pub const CHAIN: &str = "ear";

#[derive(Debug, Default)]
pub struct EarSubsystem;

impl Subsystem for EarSubsystem {
    fn name(&self) -> &'static str {
        SUBSYSTEM
    }

    fn activate(&self, _model: &Value, target: &mut DeploymentProcessorTarget) -> Result<(), OperationError> {
        target.add_deployment_chain(Arc::new(DeploymentChain::new(CHAIN)), Arc::new(ArchiveSelector::ear()), None);
        target.add_deployment_processor(CHAIN, Phase::Structure, slots::STRUCTURE_EAR, Arc::new(EarStructureProcessor))?;
        dhub_jar::register_module_processors(target, CHAIN)?;
        target.add_deployment_processor(
            CHAIN,
            Phase::Install,
            slots::INSTALL_EAR_APPLICATION,
            Arc::new(ApplicationInstallProcessor),
        )?;
        tracing::info!("Ear subsystem activated");
        Ok(())
    }
}
