use crate::chain::DeploymentChain;
use crate::error::DeploymentError;
use crate::selector::Selector;
use crate::unit::DeploymentUnit;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, trace};

/// First priority handed out by [`DeploymentChainProvider::add_deployment_chain_default`].
pub const DEFAULT_PRIORITY_BASE: i64 = 9999;

pub type SelectorRef = Arc<dyn Selector>;

type EntryKey = (i64, usize, usize);

fn address<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value).cast::<()>().addr()
}

fn entry_key(chain: &Arc<DeploymentChain>, selector: &SelectorRef, priority: i64) -> EntryKey {
    (priority, address(chain), address(selector))
}

#[derive(Clone)]
struct ChainSelector {
    chain: Arc<DeploymentChain>,
    selector: SelectorRef,
}

/// Registry mapping deployment units to the chain that processes them.
///
/// Selectors are consulted in ascending priority and the first match wins.
/// Registration may happen while other threads dispatch deployments; a lookup
/// works on a snapshot taken when it starts.
pub struct DeploymentChainProvider {
    entries: RwLock<BTreeMap<EntryKey, ChainSelector>>,
    next_default: AtomicI64,
}

impl Default for DeploymentChainProvider {
    fn default() -> Self {
        Self { entries: RwLock::default(), next_default: AtomicI64::new(DEFAULT_PRIORITY_BASE) }
    }
}

impl DeploymentChainProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `chain` behind `selector` at `priority`. Returns `false` if the
    /// same triple is already registered.
    pub fn add_deployment_chain(
        &self,
        chain: Arc<DeploymentChain>,
        selector: SelectorRef,
        priority: i64,
    ) -> bool {
        let key = entry_key(&chain, &selector, priority);
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return false;
        }
        debug!(chain = chain.name(), priority, "Deployment chain registered");
        entries.insert(key, ChainSelector { chain, selector });
        true
    }

    /// Registers at the next default priority and returns it. Default
    /// priorities start at [`DEFAULT_PRIORITY_BASE`] and only grow, so later
    /// registrations are consulted after earlier ones.
    pub fn add_deployment_chain_default(&self, chain: Arc<DeploymentChain>, selector: SelectorRef) -> i64 {
        let priority = self.next_default.fetch_add(1, Ordering::Relaxed);
        self.add_deployment_chain(chain, selector, priority);
        priority
    }

    /// Unregisters the exact `(chain, selector, priority)` triple. Unknown
    /// triples are ignored. Returns whether anything was removed.
    pub fn remove_deployment_chain(
        &self,
        chain: &Arc<DeploymentChain>,
        selector: &SelectorRef,
        priority: i64,
    ) -> bool {
        let removed = self.entries.write().remove(&entry_key(chain, selector, priority)).is_some();
        if removed {
            debug!(chain = chain.name(), priority, "Deployment chain unregistered");
        }
        removed
    }

    /// Chain of the lowest-priority selector supporting `unit`.
    ///
    /// # Errors
    /// A selector error aborts the scan and is returned as is.
    pub fn determine_deployment_chain(
        &self,
        unit: &DeploymentUnit,
    ) -> Result<Option<Arc<DeploymentChain>>, DeploymentError> {
        let snapshot: Vec<(i64, ChainSelector)> =
            self.entries.read().iter().map(|(&(priority, ..), entry)| (priority, entry.clone())).collect();

        for (priority, entry) in snapshot {
            if entry.selector.supports(unit)? {
                trace!(unit = unit.name(), chain = entry.chain.name(), priority, "Deployment chain selected");
                return Ok(Some(entry.chain));
            }
        }
        trace!(unit = unit.name(), "No deployment chain supports unit");
        Ok(None)
    }

    /// A registered chain by name.
    #[must_use]
    pub fn chain(&self, name: &str) -> Option<Arc<DeploymentChain>> {
        self.entries.read().values().find(|entry| entry.chain.name() == name).map(|entry| Arc::clone(&entry.chain))
    }

    /// Registered chain names in priority order, without duplicates.
    #[must_use]
    pub fn chain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in self.entries.read().values() {
            if !names.iter().any(|n| n == entry.chain.name()) {
                names.push(entry.chain.name().to_owned());
            }
        }
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for DeploymentChainProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentChainProvider")
            .field("chains", &self.chain_names())
            .field("next_default", &self.next_default.load(Ordering::Relaxed))
            .finish()
    }
}
