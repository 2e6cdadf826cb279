//! Management model: subsystem resources and the operations that change them.
//!
//! ```rust
//! use dhub_kernel::operation::{ModelController, Operation, PathAddress};
//! use dhub_kernel::provider::DeploymentChainProvider;
//! use dhub_services::ServiceContainer;
//! use std::sync::Arc;
//!
//! let controller = ModelController::new(Arc::new(DeploymentChainProvider::new()), ServiceContainer::new());
//! let err = controller.execute(&Operation::read_resource(PathAddress::subsystem("web")));
//! assert!(err.is_err(), "nothing was added yet");
//! ```

mod address;
mod controller;
mod error;
mod subsystem;
mod target;

pub use address::{PathAddress, SUBSYSTEM};
pub use controller::{ModelController, OperationContext, Rollback};
pub use error::{OperationError, OperationErrorExt};
pub use subsystem::Subsystem;
pub use target::DeploymentProcessorTarget;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const READ_RESOURCE: &str = "read-resource";
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
/// Runs the operations in `params.steps` as one transaction.
pub const COMPOSITE: &str = "composite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operation")]
    pub name: String,
    #[serde(default)]
    pub address: PathAddress,
    #[serde(default)]
    pub params: Value,
}

impl Operation {
    pub fn new(name: impl Into<String>, address: PathAddress, params: Value) -> Self {
        Self { name: name.into(), address, params }
    }

    #[must_use]
    pub fn add(address: PathAddress, params: Value) -> Self {
        Self::new(ADD, address, params)
    }

    #[must_use]
    pub fn remove(address: PathAddress) -> Self {
        Self::new(REMOVE, address, Value::Null)
    }

    #[must_use]
    pub fn read_resource(address: PathAddress) -> Self {
        Self::new(READ_RESOURCE, address, Value::Null)
    }

    #[must_use]
    pub fn write_attribute(address: PathAddress, name: &str, value: Value) -> Self {
        Self::new(WRITE_ATTRIBUTE, address, json!({ "name": name, "value": value }))
    }

    #[must_use]
    pub fn composite(steps: Vec<Self>) -> Self {
        let steps: Vec<Value> = steps.into_iter().filter_map(|step| serde_json::to_value(step).ok()).collect();
        Self::new(COMPOSITE, PathAddress::root(), json!({ "steps": steps }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub result: Value,
    /// The model changed in a way the running server only picks up after a reload.
    pub reload_required: bool,
}
