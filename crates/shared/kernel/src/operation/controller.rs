use super::address::{PathAddress, SUBSYSTEM};
use super::error::OperationError;
use super::subsystem::Subsystem;
use super::target::DeploymentProcessorTarget;
use super::{ADD, COMPOSITE, Operation, OperationResult, READ_RESOURCE, REMOVE, WRITE_ATTRIBUTE};
use crate::provider::DeploymentChainProvider;
use dhub_services::ServiceContainer;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Model = BTreeMap<PathAddress, Value>;

/// Undoes a completed runtime step.
pub type Rollback = Box<dyn FnOnce(&ModelController) + Send>;
type RuntimeStep = Box<dyn FnOnce(&ModelController) -> Result<Option<Rollback>, OperationError> + Send>;

/// Model stage of an operation: a staged copy of the model plus the runtime
/// steps to run once every handler succeeded.
pub struct OperationContext<'a> {
    model: &'a mut Model,
    steps: Vec<RuntimeStep>,
    result: Value,
    reload_required: bool,
}

impl<'a> OperationContext<'a> {
    fn new(model: &'a mut Model) -> Self {
        Self { model, steps: Vec::new(), result: Value::Null, reload_required: false }
    }

    #[must_use]
    pub fn read(&self, address: &PathAddress) -> Option<&Value> {
        self.model.get(address)
    }

    pub fn add_step<F>(&mut self, step: F)
    where
        F: FnOnce(&ModelController) -> Result<Option<Rollback>, OperationError> + Send + 'static,
    {
        self.steps.push(Box::new(step));
    }
}

/// Management model with transactional operations.
///
/// Operations run one at a time. Each works on a staged copy of the model;
/// the copy is committed only if every runtime step succeeds, otherwise the
/// rollbacks of completed steps run newest first and the model is left as it was.
pub struct ModelController {
    model: Mutex<Model>,
    execution: Mutex<()>,
    subsystems: RwLock<BTreeMap<&'static str, Arc<dyn Subsystem>>>,
    active: Mutex<FxHashMap<&'static str, DeploymentProcessorTarget>>,
    provider: Arc<DeploymentChainProvider>,
    services: ServiceContainer,
}

impl ModelController {
    #[must_use]
    pub fn new(provider: Arc<DeploymentChainProvider>, services: ServiceContainer) -> Self {
        Self {
            model: Mutex::default(),
            execution: Mutex::new(()),
            subsystems: RwLock::default(),
            active: Mutex::default(),
            provider,
            services,
        }
    }

    /// Makes a subsystem addressable; it stays inactive until an `add`.
    /// Returns `false` if the name is taken.
    pub fn register_subsystem(&self, subsystem: Arc<dyn Subsystem>) -> bool {
        let mut subsystems = self.subsystems.write();
        if subsystems.contains_key(subsystem.name()) {
            return false;
        }
        debug!(subsystem = subsystem.name(), "Subsystem registered");
        subsystems.insert(subsystem.name(), subsystem);
        true
    }

    /// Executes `op` atomically.
    ///
    /// # Errors
    /// Handler errors leave everything untouched; runtime step errors are
    /// returned after the rollback.
    pub fn execute(&self, op: &Operation) -> Result<OperationResult, OperationError> {
        let _serial = self.execution.lock();
        let mut staged = self.model.lock().clone();
        let mut ctx = OperationContext::new(&mut staged);

        self.dispatch(op, &mut ctx).inspect_err(|err| {
            debug!(operation = %op.name, address = %op.address, error = %err, "Operation rejected");
        })?;

        let OperationContext { steps, result, reload_required, .. } = ctx;
        let mut rollbacks: Vec<Rollback> = Vec::new();
        for step in steps {
            match step(self) {
                Ok(Some(rollback)) => rollbacks.push(rollback),
                Ok(None) => {},
                Err(err) => {
                    warn!(operation = %op.name, address = %op.address, error = %err, "Runtime step failed, rolling back");
                    for rollback in rollbacks.into_iter().rev() {
                        rollback(self);
                    }
                    return Err(err);
                },
            }
        }

        *self.model.lock() = staged;
        info!(operation = %op.name, address = %op.address, reload_required, "Operation completed");
        Ok(OperationResult { result, reload_required })
    }

    fn dispatch(&self, op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        match op.name.as_str() {
            ADD => self.add(op, ctx),
            REMOVE => self.remove(op, ctx),
            READ_RESOURCE => Self::read_resource(op, ctx),
            WRITE_ATTRIBUTE => self.write_attribute(op, ctx),
            COMPOSITE => self.composite(op, ctx),
            other => Err(OperationError::UnknownOperation {
                message: other.to_owned().into(),
                context: Some(op.address.to_string().into()),
            }),
        }
    }

    fn add(&self, op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        if ctx.model.contains_key(&op.address) {
            return Err(OperationError::Duplicate { message: op.address.to_string().into(), context: None });
        }
        let subsystem = self.subsystem_at(&op.address)?;

        let mut model = subsystem.default_model();
        merge(&mut model, &op.params)?;
        subsystem.validate(&model)?;
        ctx.model.insert(op.address.clone(), model.clone());

        ctx.add_step(move |controller| {
            controller.activate(&subsystem, &model)?;
            let name = subsystem.name();
            Ok(Some(Box::new(move |controller: &ModelController| {
                controller.deactivate(name);
            }) as Rollback))
        });
        Ok(())
    }

    fn remove(&self, op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        let subsystem = self.subsystem_at(&op.address)?;
        let previous = ctx.model.remove(&op.address).ok_or_else(|| OperationError::NotFound {
            message: op.address.to_string().into(),
            context: None,
        })?;

        ctx.add_step(move |controller| {
            controller.deactivate(subsystem.name());
            Ok(Some(Box::new(move |controller: &ModelController| {
                if let Err(err) = controller.activate(&subsystem, &previous) {
                    error!(subsystem = subsystem.name(), error = %err, "Reactivation after failed remove failed");
                }
            }) as Rollback))
        });
        Ok(())
    }

    fn read_resource(op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        ctx.result = if op.address.is_root() {
            Value::Object(ctx.model.iter().map(|(address, model)| (address.to_string(), model.clone())).collect())
        } else {
            ctx.read(&op.address).cloned().ok_or_else(|| OperationError::NotFound {
                message: op.address.to_string().into(),
                context: None,
            })?
        };
        Ok(())
    }

    /// Updates the staged model only; the running subsystem keeps its
    /// configuration until the server reloads.
    fn write_attribute(&self, op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        let (Some(Value::String(name)), Some(value)) = (op.params.get("name"), op.params.get("value")) else {
            return Err(OperationError::Invalid {
                message: "write-attribute needs 'name' and 'value' parameters".into(),
                context: Some(op.address.to_string().into()),
            });
        };
        let subsystem = self.subsystem_at(&op.address)?;

        let model = ctx.model.get_mut(&op.address).ok_or_else(|| OperationError::NotFound {
            message: op.address.to_string().into(),
            context: None,
        })?;
        let Value::Object(attributes) = model else {
            return Err(OperationError::Invalid { message: "resource has no attributes".into(), context: None });
        };
        attributes.insert(name.clone(), value.clone());
        subsystem.validate(model)?;

        ctx.reload_required = true;
        Ok(())
    }

    fn composite(&self, op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), OperationError> {
        let steps: Vec<Operation> = op
            .params
            .get("steps")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| OperationError::Invalid { message: e.to_string().into(), context: Some("composite".into()) })?
            .unwrap_or_default();

        let mut results = Vec::with_capacity(steps.len());
        for step in &steps {
            ctx.result = Value::Null;
            self.dispatch(step, ctx)?;
            results.push(std::mem::take(&mut ctx.result));
        }
        ctx.result = Value::Array(results);
        Ok(())
    }

    fn subsystem_at(&self, address: &PathAddress) -> Result<Arc<dyn Subsystem>, OperationError> {
        let name = match address.elements() {
            [(key, name)] if key == SUBSYSTEM => name,
            _ => {
                return Err(OperationError::Invalid {
                    message: format!("{address} is not a subsystem address").into(),
                    context: None,
                });
            },
        };
        self.subsystems.read().get(name.as_str()).cloned().ok_or_else(|| OperationError::NotFound {
            message: format!("subsystem '{name}'").into(),
            context: None,
        })
    }

    fn activate(&self, subsystem: &Arc<dyn Subsystem>, model: &Value) -> Result<(), OperationError> {
        let mut target =
            DeploymentProcessorTarget::new(subsystem.name(), Arc::clone(&self.provider), self.services.clone());
        if let Err(err) = subsystem.activate(model, &mut target) {
            target.revert();
            return Err(err);
        }

        info!(subsystem = subsystem.name(), registrations = target.len(), "Subsystem activated");
        if let Some(stale) = self.active.lock().insert(subsystem.name(), target) {
            stale.revert();
        }
        Ok(())
    }

    fn deactivate(&self, name: &str) -> bool {
        let Some(target) = self.active.lock().remove(name) else {
            return false;
        };
        target.revert();
        info!(subsystem = name, "Subsystem deactivated");
        true
    }

    /// Committed model of a resource.
    #[must_use]
    pub fn read_model(&self, address: &PathAddress) -> Option<Value> {
        self.model.lock().get(address).cloned()
    }

    #[must_use]
    pub fn is_active(&self, subsystem: &str) -> bool {
        self.active.lock().contains_key(subsystem)
    }

    /// Names of registered subsystems, sorted.
    #[must_use]
    pub fn subsystems(&self) -> Vec<&'static str> {
        self.subsystems.read().keys().copied().collect()
    }

    #[must_use]
    pub const fn provider(&self) -> &Arc<DeploymentChainProvider> {
        &self.provider
    }

    #[must_use]
    pub const fn services(&self) -> &ServiceContainer {
        &self.services
    }
}

impl fmt::Debug for ModelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelController")
            .field("resources", &self.model.lock().len())
            .field("subsystems", &self.subsystems())
            .finish_non_exhaustive()
    }
}

fn merge(model: &mut Value, params: &Value) -> Result<(), OperationError> {
    match (model, params) {
        (_, Value::Null) => Ok(()),
        (Value::Object(model), Value::Object(params)) => {
            model.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        },
        (model @ Value::Null, Value::Object(params)) => {
            *model = Value::Object(params.clone());
            Ok(())
        },
        _ => Err(OperationError::Invalid { message: "parameters must be an object".into(), context: None }),
    }
}
