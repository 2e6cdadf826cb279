use crate::error::DeploymentError;
use crate::unit::DeploymentUnit;
use dhub_domain::Phase;
use dhub_services::ServiceContainer;
use std::any::type_name;
use std::fmt;

/// A unit of work run against a deployment unit by a [`DeploymentChain`](crate::chain::DeploymentChain).
///
/// Processors are shared between chains and registrations, so they take `&self`
/// and keep per-deployment state in the unit's attachments.
pub trait DeploymentUnitProcessor: Send + Sync {
    /// # Errors
    /// Any error aborts the remaining processors of the chain.
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError>;

    /// Reverses `deploy`. Runs in descending priority order on undeploy and for
    /// processors that completed before a failure.
    fn undeploy(&self, _unit: &mut DeploymentUnit) {}

    fn name(&self) -> &'static str {
        let full = type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// What a processor sees while it runs.
pub struct DeploymentPhaseContext<'a> {
    unit: &'a mut DeploymentUnit,
    services: &'a ServiceContainer,
    priority: i64,
}

impl<'a> DeploymentPhaseContext<'a> {
    pub(crate) const fn new(
        unit: &'a mut DeploymentUnit,
        services: &'a ServiceContainer,
        priority: i64,
    ) -> Self {
        Self { unit, services, priority }
    }

    #[must_use]
    pub const fn unit(&self) -> &DeploymentUnit {
        &*self.unit
    }

    pub const fn unit_mut(&mut self) -> &mut DeploymentUnit {
        &mut *self.unit
    }

    #[must_use]
    pub const fn services(&self) -> &ServiceContainer {
        self.services
    }

    /// Priority the running processor was registered at.
    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    /// Phase of the running processor, `None` for priorities not composed by [`Phase::priority`].
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        Phase::of(self.priority)
    }
}

impl fmt::Debug for DeploymentPhaseContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentPhaseContext")
            .field("unit", &self.unit.name())
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Adapts a closure into a processor.
pub struct FnProcessor<F> {
    name: &'static str,
    deploy: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> + Send + Sync,
{
    pub const fn new(name: &'static str, deploy: F) -> Self {
        Self { name, deploy }
    }
}

impl<F> DeploymentUnitProcessor for FnProcessor<F>
where
    F: Fn(&mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> + Send + Sync,
{
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        (self.deploy)(ctx)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
