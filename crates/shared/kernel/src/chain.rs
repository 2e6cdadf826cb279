use crate::error::DeploymentError;
use crate::processor::{DeploymentPhaseContext, DeploymentUnitProcessor};
use crate::unit::DeploymentUnit;
use dhub_services::ServiceContainer;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

pub type ProcessorRef = Arc<dyn DeploymentUnitProcessor>;

/// Processor identity is the allocation it lives in.
fn identity(processor: &ProcessorRef) -> usize {
    Arc::as_ptr(processor).cast::<()>().addr()
}

/// A processor registered at a priority.
///
/// Ordered by priority, then by processor identity, so the same processor can
/// appear at several priorities and distinct processors can share one.
#[derive(Clone)]
pub struct OrderedProcessor {
    priority: i64,
    processor: ProcessorRef,
}

impl OrderedProcessor {
    #[must_use]
    pub const fn new(processor: ProcessorRef, priority: i64) -> Self {
        Self { priority, processor }
    }

    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    #[must_use]
    pub const fn processor(&self) -> &ProcessorRef {
        &self.processor
    }

    fn key(&self) -> (i64, usize) {
        (self.priority, identity(&self.processor))
    }
}

impl PartialEq for OrderedProcessor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OrderedProcessor {}

impl PartialOrd for OrderedProcessor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedProcessor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Debug for OrderedProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.processor.name(), self.priority)
    }
}

/// Named, ordered set of processors that a class of deployments runs through.
pub struct DeploymentChain {
    name: String,
    processors: RwLock<BTreeMap<(i64, usize), ProcessorRef>>,
}

impl DeploymentChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), processors: RwLock::default() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `processor` at `priority`. Returns `false` if that exact pair
    /// is already registered.
    pub fn add_processor(&self, processor: ProcessorRef, priority: i64) -> bool {
        let entry = OrderedProcessor::new(processor, priority);
        let mut processors = self.processors.write();
        if processors.contains_key(&entry.key()) {
            return false;
        }
        trace!(chain = %self.name, processor = entry.processor.name(), priority, "Processor added");
        processors.insert(entry.key(), entry.processor);
        true
    }

    /// Unregisters the `(processor, priority)` pair. Other registrations of the
    /// same processor are kept. Returns whether anything was removed.
    pub fn remove_processor(&self, processor: &ProcessorRef, priority: i64) -> bool {
        self.processors.write().remove(&(priority, identity(processor))).is_some()
    }

    /// Registered processors in ascending order.
    #[must_use]
    pub fn processors(&self) -> Vec<OrderedProcessor> {
        self.processors
            .read()
            .iter()
            .map(|(&(priority, _), processor)| OrderedProcessor::new(Arc::clone(processor), priority))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }

    /// Runs every processor once, in ascending priority order, on the calling thread.
    ///
    /// The set is snapshotted first; registrations made meanwhile apply to the
    /// next deployment.
    ///
    /// # Errors
    /// Stops at the first failing processor and returns
    /// [`DeploymentError::Processor`] naming it. Processors that already ran are
    /// not undone here; see [`DeploymentChain::process_recorded`].
    pub fn process_deployment(
        &self,
        unit: &mut DeploymentUnit,
        services: &ServiceContainer,
    ) -> Result<(), DeploymentError> {
        self.process_recorded(unit, services, &mut Vec::new())
    }

    /// Like [`DeploymentChain::process_deployment`], but appends every processor
    /// whose `deploy` succeeded to `completed`, in the order they ran. That list is
    /// exactly what [`DeploymentChain::undo_completed`] has to reverse, whether the
    /// run failed halfway or the unit is undeployed much later.
    ///
    /// # Errors
    /// Same as [`DeploymentChain::process_deployment`].
    pub fn process_recorded(
        &self,
        unit: &mut DeploymentUnit,
        services: &ServiceContainer,
        completed: &mut Vec<OrderedProcessor>,
    ) -> Result<(), DeploymentError> {
        let snapshot = self.processors();
        debug!(chain = %self.name, unit = unit.name(), processors = snapshot.len(), "Processing deployment");

        for entry in snapshot {
            let name = entry.processor.name();
            trace!(chain = %self.name, unit = unit.name(), processor = name, priority = entry.priority, "Running processor");

            let mut ctx = DeploymentPhaseContext::new(unit, services, entry.priority);
            entry.processor.deploy(&mut ctx).map_err(|err| DeploymentError::Processor {
                processor: name.into(),
                priority: entry.priority,
                reason: Box::new(err),
                context: Some(format!("{} in chain {}", unit.name(), self.name).into()),
            })?;
            completed.push(entry);
        }

        info!(chain = %self.name, unit = unit.name(), "Deployment processed");
        Ok(())
    }

    /// Runs `undeploy` on `completed` newest first. Current registrations are
    /// not consulted.
    pub fn undo_completed(&self, unit: &mut DeploymentUnit, completed: &[OrderedProcessor]) {
        for entry in completed.iter().rev() {
            trace!(chain = %self.name, unit = unit.name(), processor = entry.processor.name(), "Undeploying processor");
            entry.processor.undeploy(unit);
        }
        debug!(chain = %self.name, unit = unit.name(), processors = completed.len(), "Deployment undone");
    }

    /// Runs `undeploy` for the currently registered processors in descending
    /// priority order. With `below`, only processors registered strictly below
    /// that priority run.
    pub fn undeploy(&self, unit: &mut DeploymentUnit, below: Option<i64>) {
        let snapshot: Vec<OrderedProcessor> = self
            .processors()
            .into_iter()
            .filter(|e| below.is_none_or(|limit| e.priority < limit))
            .collect();
        self.undo_completed(unit, &snapshot);
    }
}

impl fmt::Debug for DeploymentChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentChain")
            .field("name", &self.name)
            .field("processors", &self.processors())
            .finish()
    }
}
