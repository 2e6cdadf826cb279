//! # Deployment Kernel
//!
//! Everything between "a file appeared in the deployments directory" and "its
//! services are up":
//!
//! * [`unit`]: a mounted [`DeploymentUnit`](unit::DeploymentUnit) and its typed [`attachment`]s.
//! * [`chain`]: ordered [`DeploymentUnitProcessor`](processor::DeploymentUnitProcessor)s run per unit.
//! * [`provider`]: first-match [`Selector`](selector::Selector) registry picking the chain.
//! * [`deployer`]: runs units through chains, verifies their services, rolls back failures.
//! * [`operation`]: the management model through which subsystems register chains and processors.
//!
//! ```rust
//! use dhub_kernel::prelude::*;
//! use std::sync::Arc;
//!
//! let chain = Arc::new(DeploymentChain::new("web"));
//! chain.add_processor(
//!     Arc::new(FnProcessor::new("mark", |ctx: &mut DeploymentPhaseContext<'_>| {
//!         assert_eq!(ctx.phase(), Some(Phase::Parse));
//!         Ok(())
//!     })),
//!     Phase::Parse.priority(0x0100),
//! );
//!
//! let provider = DeploymentChainProvider::new();
//! provider.add_deployment_chain_default(Arc::clone(&chain), Arc::new(ArchiveSelector::war()));
//!
//! let mut unit = DeploymentUnit::detached("shop.war");
//! let selected = provider.determine_deployment_chain(&unit).unwrap().unwrap();
//! selected.process_deployment(&mut unit, &ServiceContainer::new()).unwrap();
//! ```

pub mod attachment;
pub mod chain;
pub mod config;
pub mod deployer;
mod error;
pub mod operation;
pub mod processor;
pub mod provider;
pub mod selector;
pub mod unit;

pub use dhub_domain as domain;
pub use error::{DeploymentError, DeploymentErrorExt};

pub mod prelude {
    pub use crate::attachment::{AttachmentKey, AttachmentList, Attachments};
    pub use crate::chain::{DeploymentChain, OrderedProcessor, ProcessorRef};
    pub use crate::deployer::{DeploymentInfo, DeploymentManager};
    pub use crate::error::DeploymentError;
    pub use crate::operation::{
        DeploymentProcessorTarget, ModelController, Operation, OperationError, OperationResult,
        PathAddress, Subsystem,
    };
    pub use crate::processor::{DeploymentPhaseContext, DeploymentUnitProcessor, FnProcessor};
    pub use crate::provider::{DeploymentChainProvider, SelectorRef};
    pub use crate::selector::{ArchiveSelector, FnSelector, Selector};
    pub use crate::unit::{DeploymentRoot, DeploymentUnit, Manifest};
    pub use dhub_domain::Phase;
    pub use dhub_domain::phase::slots;
    pub use dhub_services::{Service, ServiceContainer, ServiceError, ServiceName, ServiceState, StartContext};
}
