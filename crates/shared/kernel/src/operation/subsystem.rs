use super::error::OperationError;
use super::target::DeploymentProcessorTarget;
use serde_json::{Map, Value};

/// A unit of server functionality managed through `/subsystem=<name>`.
///
/// `activate` runs as the runtime step of an `add` operation. Everything it
/// registers through the target is reverted on `remove` or when a later step
/// of the same operation fails.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &'static str;

    /// Model used when `add` gives no parameters; parameters are merged over it.
    fn default_model(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Checks a model before it is staged.
    ///
    /// # Errors
    /// Returns [`OperationError::Invalid`] for a model the subsystem cannot run with.
    fn validate(&self, model: &Value) -> Result<(), OperationError> {
        let _ = model;
        Ok(())
    }

    /// # Errors
    /// Any error fails the operation and reverts what the target recorded.
    fn activate(&self, model: &Value, target: &mut DeploymentProcessorTarget) -> Result<(), OperationError>;
}
