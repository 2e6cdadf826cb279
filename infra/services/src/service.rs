use crate::error::ServiceError;
use crate::name::ServiceName;
use fxhash::FxHashMap;
use std::any::{Any, type_name};
use std::sync::Arc;

pub(crate) type ServiceValue = Arc<dyn Any + Send + Sync>;

/// A runtime service managed by the [`ServiceContainer`](crate::ServiceContainer).
///
/// `start` runs once every dependency is `Up`; `stop` runs before the service
/// or any of its dependencies leave the container.
pub trait Service: Any + Send + Sync {
    /// # Errors
    /// A failed start leaves the service `Failed` and its dependents `Waiting`.
    fn start(&self, ctx: &StartContext<'_>) -> Result<(), ServiceError>;

    fn stop(&self) {}
}

/// Whether the container should try to bring a service up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceMode {
    #[default]
    Active,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Active but at least one dependency is not `Up` yet.
    Waiting,
    Up,
    Failed,
    /// Mode is [`ServiceMode::Never`].
    Down,
}

/// Passed to [`Service::start`]; exposes the values of declared dependencies.
pub struct StartContext<'a> {
    name: &'a ServiceName,
    dependencies: &'a FxHashMap<ServiceName, ServiceValue>,
}

impl<'a> StartContext<'a> {
    pub(crate) const fn new(
        name: &'a ServiceName,
        dependencies: &'a FxHashMap<ServiceName, ServiceValue>,
    ) -> Self {
        Self { name, dependencies }
    }

    /// Name of the service being started.
    #[must_use]
    pub const fn name(&self) -> &ServiceName {
        self.name
    }

    /// Returns the value of a declared dependency.
    ///
    /// # Errors
    /// Returns [`ServiceError::DependencyUnavailable`] when `name` is not a declared
    /// dependency or its value is not an `S`.
    pub fn dependency<S: Service>(&self, name: &ServiceName) -> Result<Arc<S>, ServiceError> {
        let value = self.dependencies.get(name).ok_or_else(|| ServiceError::DependencyUnavailable {
            message: format!("{name} is not a dependency of {}", self.name).into(),
            context: None,
        })?;

        Arc::clone(value).downcast::<S>().map_err(|_| ServiceError::DependencyUnavailable {
            message: format!("{name} is not a {}", type_name::<S>()).into(),
            context: Some(self.name.to_string().into()),
        })
    }
}
