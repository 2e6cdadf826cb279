use crate::error::ServiceError;
use crate::name::ServiceName;
use crate::service::{Service, ServiceMode, ServiceState, ServiceValue, StartContext};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Entry {
    service: Arc<dyn Service>,
    value: ServiceValue,
    dependencies: Vec<ServiceName>,
    mode: ServiceMode,
    state: ServiceState,
    /// Set while `start` runs outside the registry lock.
    starting: bool,
    failure: Option<String>,
}

struct StartJob {
    name: ServiceName,
    service: Arc<dyn Service>,
    dependencies: FxHashMap<ServiceName, ServiceValue>,
}

#[derive(Default)]
struct Registry {
    entries: FxHashMap<ServiceName, Entry>,
}

impl Registry {
    /// True when `target` is reachable from `from` along dependency edges.
    fn reaches(&self, from: &ServiceName, target: &ServiceName) -> bool {
        let mut stack = vec![from.clone()];
        let mut seen = FxHashSet::default();
        while let Some(name) = stack.pop() {
            if &name == target {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(entry) = self.entries.get(&name) {
                stack.extend(entry.dependencies.iter().cloned());
            }
        }
        false
    }

    fn is_ready(&self, entry: &Entry) -> bool {
        entry.mode == ServiceMode::Active
            && entry.state == ServiceState::Waiting
            && !entry.starting
            && entry
                .dependencies
                .iter()
                .all(|dep| self.entries.get(dep).is_some_and(|d| d.state == ServiceState::Up))
    }

    fn take_ready(&mut self) -> Vec<StartJob> {
        let mut ready: Vec<ServiceName> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_ready(entry))
            .map(|(name, _)| name.clone())
            .collect();
        ready.sort();

        let mut jobs = Vec::with_capacity(ready.len());
        for name in ready {
            let dependencies = self.entries[&name]
                .dependencies
                .iter()
                .filter_map(|dep| self.entries.get(dep).map(|d| (dep.clone(), Arc::clone(&d.value))))
                .collect();
            if let Some(entry) = self.entries.get_mut(&name) {
                entry.starting = true;
                jobs.push(StartJob { service: Arc::clone(&entry.service), name, dependencies });
            }
        }
        jobs
    }

    fn dependents_of(&self, name: &ServiceName) -> Vec<ServiceName> {
        let mut dependents: Vec<ServiceName> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.dependencies.contains(name))
            .map(|(n, _)| n.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Post-order walk over reverse dependency edges: every service appears after
    /// all services that depend on it.
    fn visit_dependents(
        &self,
        name: &ServiceName,
        seen: &mut FxHashSet<ServiceName>,
        order: &mut Vec<ServiceName>,
    ) {
        if !seen.insert(name.clone()) {
            return;
        }
        for dependent in self.dependents_of(name) {
            self.visit_dependents(&dependent, seen, order);
        }
        order.push(name.clone());
    }

    fn dependents_first<'a>(&self, roots: impl IntoIterator<Item = &'a ServiceName>) -> Vec<ServiceName> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        for root in roots {
            self.visit_dependents(root, &mut seen, &mut order);
        }
        order
    }

    /// Moves `root` and its transitive dependents out of `Up`, returning the
    /// services to stop in order. `root` itself ends in `root_state`.
    fn take_down(&mut self, root: &ServiceName, root_state: ServiceState) -> Vec<Arc<dyn Service>> {
        let order = self.dependents_first([root]);
        let mut stops = Vec::new();
        for name in &order {
            let Some(entry) = self.entries.get_mut(name) else { continue };
            if entry.state == ServiceState::Up {
                stops.push(Arc::clone(&entry.service));
                entry.state = ServiceState::Waiting;
                debug!(service = %name, "Service going down");
            }
            if name == root {
                entry.state = root_state;
            }
        }
        stops
    }
}

/// Registry of runtime services and their dependencies.
///
/// Cloning is cheap; clones share the same registry. Service callbacks always run
/// outside the registry lock, so a service may use the container from `start`.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer").field("services", &self.len()).finish()
    }
}

impl ServiceContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building the installation of `service` under `name`.
    pub fn add_service<S: Service>(&self, name: ServiceName, service: S) -> ServiceBuilder<'_> {
        let service = Arc::new(service);
        ServiceBuilder {
            container: self,
            name,
            value: Arc::clone(&service) as ServiceValue,
            service,
            dependencies: Vec::new(),
            mode: ServiceMode::Active,
        }
    }

    /// Stops the service and any `Up` dependents, then removes it. Dependents
    /// stay installed and return to `Waiting`.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotFound`] if no such service is installed.
    pub fn remove(&self, name: &ServiceName) -> Result<(), ServiceError> {
        let stops = {
            let mut registry = self.registry.lock();
            if !registry.entries.contains_key(name) {
                return Err(not_found(name));
            }
            let stops = registry.take_down(name, ServiceState::Down);
            registry.entries.remove(name);
            stops
        };

        stop_all(&stops);
        info!(service = %name, "Service removed");
        Ok(())
    }

    /// Removes `prefix` and every service below it, dependents first. Returns
    /// the number of services removed.
    pub fn remove_children(&self, prefix: &ServiceName) -> usize {
        let order = {
            let registry = self.registry.lock();
            let mut targets: Vec<&ServiceName> = registry
                .entries
                .keys()
                .filter(|name| *name == prefix || prefix.is_parent_of(name))
                .collect();
            targets.sort();
            let targets_set: FxHashSet<&ServiceName> = targets.iter().copied().collect();
            registry
                .dependents_first(targets.iter().copied())
                .into_iter()
                .filter(|name| targets_set.contains(name))
                .collect::<Vec<_>>()
        };

        order.iter().filter(|name| self.remove(name).is_ok()).count()
    }

    /// Changes the mode of a service. `Never` takes it and its dependents down;
    /// `Active` makes a `Down` or `Failed` service eligible to start again.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotFound`] if no such service is installed.
    pub fn set_mode(&self, name: &ServiceName, mode: ServiceMode) -> Result<(), ServiceError> {
        let stops = {
            let mut registry = self.registry.lock();
            let entry = registry.entries.get_mut(name).ok_or_else(|| not_found(name))?;
            if entry.mode == mode && entry.state != ServiceState::Failed {
                return Ok(());
            }
            entry.mode = mode;
            match mode {
                ServiceMode::Never => registry.take_down(name, ServiceState::Down),
                ServiceMode::Active => {
                    entry.state = ServiceState::Waiting;
                    entry.failure = None;
                    Vec::new()
                },
            }
        };

        stop_all(&stops);
        debug!(service = %name, ?mode, "Service mode changed");
        self.resolve();
        Ok(())
    }

    #[must_use]
    pub fn state(&self, name: &ServiceName) -> Option<ServiceState> {
        self.registry.lock().entries.get(name).map(|entry| entry.state)
    }

    /// The service instance when it is `Up` and is an `S`.
    #[must_use]
    pub fn value<S: Service>(&self, name: &ServiceName) -> Option<Arc<S>> {
        let value = {
            let registry = self.registry.lock();
            let entry = registry.entries.get(name).filter(|e| e.state == ServiceState::Up)?;
            Arc::clone(&entry.value)
        };
        value.downcast::<S>().ok()
    }

    #[must_use]
    pub fn contains(&self, name: &ServiceName) -> bool {
        self.registry.lock().entries.contains_key(name)
    }

    /// Installed service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<ServiceName> {
        let mut names: Vec<_> = self.registry.lock().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Services whose declared dependencies are not installed.
    #[must_use]
    pub fn missing_dependencies(&self) -> BTreeMap<ServiceName, Vec<ServiceName>> {
        let registry = self.registry.lock();
        registry
            .entries
            .iter()
            .filter_map(|(name, entry)| {
                let missing: Vec<_> = entry
                    .dependencies
                    .iter()
                    .filter(|dep| !registry.entries.contains_key(*dep))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| (name.clone(), missing))
            })
            .collect()
    }

    /// Failed services with the reason their start failed.
    #[must_use]
    pub fn failed(&self) -> BTreeMap<ServiceName, String> {
        self.registry
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.state == ServiceState::Failed)
            .map(|(name, entry)| (name.clone(), entry.failure.clone().unwrap_or_default()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops every service in reverse dependency order and empties the container.
    /// Returns the number of services removed.
    pub fn shutdown(&self) -> usize {
        let (count, stops) = {
            let mut registry = self.registry.lock();
            let mut roots: Vec<ServiceName> = registry.entries.keys().cloned().collect();
            roots.sort();
            let stops: Vec<_> = registry
                .dependents_first(&roots)
                .iter()
                .filter_map(|name| registry.entries.get(name))
                .filter(|entry| entry.state == ServiceState::Up)
                .map(|entry| Arc::clone(&entry.service))
                .collect();
            let count = registry.entries.len();
            registry.entries.clear();
            (count, stops)
        };

        stop_all(&stops);
        info!(count, "Service container shut down");
        count
    }

    fn install(&self, builder: ServiceBuilder<'_>) -> Result<ServiceState, ServiceError> {
        let ServiceBuilder { name, service, value, dependencies, mode, .. } = builder;
        {
            let mut registry = self.registry.lock();
            if registry.entries.contains_key(&name) {
                return Err(ServiceError::Duplicate { message: name.to_string().into(), context: None });
            }
            if let Some(dep) = dependencies.iter().find(|dep| registry.reaches(dep, &name)) {
                return Err(ServiceError::Cycle {
                    message: format!("{name} -> {dep} -> ... -> {name}").into(),
                    context: None,
                });
            }

            let state = match mode {
                ServiceMode::Active => ServiceState::Waiting,
                ServiceMode::Never => ServiceState::Down,
            };
            debug!(service = %name, dependencies = dependencies.len(), "Service installed");
            registry.entries.insert(
                name.clone(),
                Entry { service, value, dependencies, mode, state, starting: false, failure: None },
            );
        }

        self.resolve();
        self.state(&name).ok_or_else(|| not_found(&name))
    }

    /// Starts every eligible service until nothing changes.
    fn resolve(&self) {
        loop {
            let jobs = self.registry.lock().take_ready();
            if jobs.is_empty() {
                break;
            }
            for job in jobs {
                self.start(job);
            }
        }
    }

    fn start(&self, job: StartJob) {
        let StartJob { name, service, dependencies } = job;
        let result = service.start(&StartContext::new(&name, &dependencies));

        let orphaned = {
            let mut registry = self.registry.lock();
            match registry.entries.get_mut(&name) {
                Some(entry) if entry.starting => {
                    entry.starting = false;
                    match &result {
                        Ok(()) => {
                            entry.state = ServiceState::Up;
                            entry.failure = None;
                        },
                        Err(err) => {
                            entry.state = ServiceState::Failed;
                            entry.failure = Some(err.to_string());
                        },
                    }
                    false
                },
                _ => result.is_ok(),
            }
        };

        match result {
            Ok(()) if orphaned => service.stop(),
            Ok(()) => info!(service = %name, "Service started"),
            Err(err) => warn!(service = %name, error = %err, "Service failed to start"),
        }
    }
}

/// Collects dependencies and mode before [`ServiceBuilder::install`].
#[must_use = "a service is only registered once `install` is called"]
pub struct ServiceBuilder<'a> {
    container: &'a ServiceContainer,
    name: ServiceName,
    service: Arc<dyn Service>,
    value: ServiceValue,
    dependencies: Vec<ServiceName>,
    mode: ServiceMode,
}

impl ServiceBuilder<'_> {
    pub fn add_dependency(mut self, name: ServiceName) -> Self {
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
        self
    }

    pub fn add_dependencies(self, names: impl IntoIterator<Item = ServiceName>) -> Self {
        names.into_iter().fold(self, Self::add_dependency)
    }

    pub const fn mode(mut self, mode: ServiceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Registers the service and starts whatever became startable.
    /// Returns the state of this service afterwards.
    ///
    /// # Errors
    /// * [`ServiceError::Duplicate`] if the name is taken.
    /// * [`ServiceError::Cycle`] if a dependency (transitively) depends on this service.
    pub fn install(self) -> Result<ServiceState, ServiceError> {
        self.container.install(self)
    }
}

fn stop_all(services: &[Arc<dyn Service>]) {
    for service in services {
        service.stop();
    }
}

fn not_found(name: &ServiceName) -> ServiceError {
    ServiceError::NotFound { message: name.to_string().into(), context: None }
}
