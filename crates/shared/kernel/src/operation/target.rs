use super::error::OperationError;
use crate::chain::{DeploymentChain, ProcessorRef};
use crate::provider::{DeploymentChainProvider, SelectorRef};
use dhub_domain::Phase;
use dhub_services::{Service, ServiceContainer, ServiceName, ServiceState};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

enum Registration {
    Chain { chain: Arc<DeploymentChain>, selector: SelectorRef, priority: i64 },
    Processor { chain: Arc<DeploymentChain>, processor: ProcessorRef, priority: i64 },
    Service { name: ServiceName },
}

/// Handed to [`Subsystem::activate`](super::Subsystem::activate); records every
/// chain, processor and service a subsystem registers so they can be reverted
/// when the subsystem is removed or its activation fails.
pub struct DeploymentProcessorTarget {
    subsystem: String,
    provider: Arc<DeploymentChainProvider>,
    services: ServiceContainer,
    registrations: Vec<Registration>,
}

impl DeploymentProcessorTarget {
    pub(crate) fn new(
        subsystem: impl Into<String>,
        provider: Arc<DeploymentChainProvider>,
        services: ServiceContainer,
    ) -> Self {
        Self { subsystem: subsystem.into(), provider, services, registrations: Vec::new() }
    }

    /// Registers `chain` behind `selector`; `None` picks the next default priority.
    /// Returns the priority used.
    pub fn add_deployment_chain(
        &mut self,
        chain: Arc<DeploymentChain>,
        selector: SelectorRef,
        priority: Option<i64>,
    ) -> i64 {
        let priority = match priority {
            Some(priority) => {
                if !self.provider.add_deployment_chain(Arc::clone(&chain), Arc::clone(&selector), priority) {
                    return priority;
                }
                priority
            },
            None => self.provider.add_deployment_chain_default(Arc::clone(&chain), Arc::clone(&selector)),
        };
        debug!(subsystem = %self.subsystem, chain = chain.name(), priority, "Chain registered");
        self.registrations.push(Registration::Chain { chain, selector, priority });
        priority
    }

    /// Adds `processor` to the chain named `chain` at `phase.priority(slot)`.
    ///
    /// # Errors
    /// Returns [`OperationError::NotFound`] when no chain with that name is
    /// registered by this target or the provider.
    pub fn add_deployment_processor(
        &mut self,
        chain: &str,
        phase: Phase,
        slot: u32,
        processor: ProcessorRef,
    ) -> Result<(), OperationError> {
        let target = self.find_chain(chain).ok_or_else(|| OperationError::NotFound {
            message: format!("deployment chain '{chain}'").into(),
            context: Some(self.subsystem.clone().into()),
        })?;

        let priority = phase.priority(slot);
        if target.add_processor(Arc::clone(&processor), priority) {
            debug!(subsystem = %self.subsystem, chain, processor = processor.name(), %phase, slot, "Processor registered");
            self.registrations.push(Registration::Processor { chain: target, processor, priority });
        }
        Ok(())
    }

    /// Installs a service owned by the subsystem.
    ///
    /// # Errors
    /// Propagates installation errors (duplicate name, dependency cycle).
    pub fn install_service<S: Service>(
        &mut self,
        name: ServiceName,
        service: S,
        dependencies: impl IntoIterator<Item = ServiceName>,
    ) -> Result<ServiceState, OperationError> {
        let state = self.services.add_service(name.clone(), service).add_dependencies(dependencies).install()?;
        self.registrations.push(Registration::Service { name });
        Ok(state)
    }

    #[must_use]
    pub const fn services(&self) -> &ServiceContainer {
        &self.services
    }

    #[must_use]
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Undoes every registration, newest first.
    pub fn revert(mut self) {
        while let Some(registration) = self.registrations.pop() {
            match registration {
                Registration::Chain { chain, selector, priority } => {
                    self.provider.remove_deployment_chain(&chain, &selector, priority);
                },
                Registration::Processor { chain, processor, priority } => {
                    chain.remove_processor(&processor, priority);
                },
                Registration::Service { name } => {
                    if let Err(err) = self.services.remove(&name) {
                        warn!(subsystem = %self.subsystem, service = %name, error = %err, "Service already gone");
                    }
                },
            }
        }
        debug!(subsystem = %self.subsystem, "Registrations reverted");
    }

    fn find_chain(&self, name: &str) -> Option<Arc<DeploymentChain>> {
        self.registrations
            .iter()
            .rev()
            .find_map(|registration| match registration {
                Registration::Chain { chain, .. } if chain.name() == name => Some(Arc::clone(chain)),
                _ => None,
            })
            .or_else(|| self.provider.chain(name))
    }
}

impl fmt::Debug for DeploymentProcessorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentProcessorTarget")
            .field("subsystem", &self.subsystem)
            .field("registrations", &self.registrations.len())
            .finish_non_exhaustive()
    }
}
