use dhub_kernel::operation::{OperationError, READ_RESOURCE};
use dhub_kernel::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

struct Idle;

impl Service for Idle {
    fn start(&self, _: &StartContext<'_>) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Registers a chain, a processor and a service; fails afterwards when the model says so.
struct Probe;

impl Subsystem for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn default_model(&self) -> Value {
        json!({ "fail": false, "limit": 1 })
    }

    fn validate(&self, model: &Value) -> Result<(), OperationError> {
        match model.get("limit").and_then(Value::as_i64) {
            Some(limit) if limit > 0 => Ok(()),
            _ => Err(OperationError::Invalid { message: "limit must be positive".into(), context: None }),
        }
    }

    fn activate(&self, model: &Value, target: &mut DeploymentProcessorTarget) -> Result<(), OperationError> {
        target.add_deployment_chain(Arc::new(DeploymentChain::new("probe")), Arc::new(ArchiveSelector::jar()), None);
        target.add_deployment_processor(
            "probe",
            Phase::Parse,
            1,
            Arc::new(FnProcessor::new("noop", |_: &mut DeploymentPhaseContext<'_>| Ok(()))),
        )?;
        target.install_service(probe_service(), Idle, [])?;

        if model["fail"] == json!(true) {
            return Err(OperationError::Runtime { message: "probe refused to start".into(), context: None });
        }
        Ok(())
    }
}

struct Broken;

impl Subsystem for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn activate(&self, _: &Value, _: &mut DeploymentProcessorTarget) -> Result<(), OperationError> {
        Err(OperationError::Runtime { message: "always fails".into(), context: None })
    }
}

fn probe_service() -> ServiceName {
    ServiceName::of(["dhub", "probe"])
}

fn controller() -> ModelController {
    let controller = ModelController::new(Arc::new(DeploymentChainProvider::new()), ServiceContainer::new());
    assert!(controller.register_subsystem(Arc::new(Probe)));
    assert!(controller.register_subsystem(Arc::new(Broken)));
    assert!(!controller.register_subsystem(Arc::new(Probe)), "names are unique");
    controller
}

fn assert_untouched(controller: &ModelController) {
    assert!(!controller.is_active("probe"));
    assert!(controller.provider().is_empty());
    assert!(controller.services().is_empty());
    assert_eq!(controller.read_model(&PathAddress::subsystem("probe")), None);
}

#[test]
fn test_add_activates_subsystem() {
    let controller = controller();

    let result = controller.execute(&Operation::add(PathAddress::subsystem("probe"), json!({ "limit": 5 }))).unwrap();

    assert!(!result.reload_required);
    assert!(controller.is_active("probe"));
    assert_eq!(controller.provider().chain_names(), ["probe"]);
    assert_eq!(controller.provider().chain("probe").map(|c| c.len()), Some(1));
    assert_eq!(controller.services().state(&probe_service()), Some(ServiceState::Up));
    assert_eq!(
        controller.read_model(&PathAddress::subsystem("probe")),
        Some(json!({ "fail": false, "limit": 5 }))
    );
}

#[test]
fn test_add_rejections() {
    let controller = controller();
    let probe = PathAddress::subsystem("probe");
    controller.execute(&Operation::add(probe.clone(), Value::Null)).unwrap();

    let duplicate = controller.execute(&Operation::add(probe, Value::Null)).unwrap_err();
    assert!(matches!(duplicate, OperationError::Duplicate { .. }), "{duplicate}");

    let unknown = controller.execute(&Operation::add(PathAddress::subsystem("nope"), Value::Null)).unwrap_err();
    assert!(matches!(unknown, OperationError::NotFound { .. }), "{unknown}");

    let nested = PathAddress::subsystem("broken").append("host", "a");
    let invalid = controller.execute(&Operation::add(nested, Value::Null)).unwrap_err();
    assert!(matches!(invalid, OperationError::Invalid { .. }), "{invalid}");

    let params = controller.execute(&Operation::add(PathAddress::subsystem("broken"), json!([1]))).unwrap_err();
    assert!(matches!(params, OperationError::Invalid { .. }), "{params}");
}

#[test]
fn test_failed_activation_reverts_registrations() {
    let controller = controller();

    let err = controller.execute(&Operation::add(PathAddress::subsystem("probe"), json!({ "fail": true }))).unwrap_err();

    assert!(matches!(err, OperationError::Runtime { .. }), "{err}");
    assert_untouched(&controller);
}

#[test]
fn test_invalid_model_is_never_activated() {
    let controller = controller();

    let err = controller.execute(&Operation::add(PathAddress::subsystem("probe"), json!({ "limit": 0 }))).unwrap_err();

    assert!(matches!(err, OperationError::Invalid { .. }), "{err}");
    assert_untouched(&controller);
}

#[test]
fn test_remove_reverts_and_is_not_repeatable() {
    let controller = controller();
    let probe = PathAddress::subsystem("probe");
    controller.execute(&Operation::add(probe.clone(), Value::Null)).unwrap();

    controller.execute(&Operation::remove(probe.clone())).unwrap();
    assert_untouched(&controller);

    let again = controller.execute(&Operation::remove(probe)).unwrap_err();
    assert!(matches!(again, OperationError::NotFound { .. }), "{again}");
}

#[test]
fn test_write_attribute_requires_reload() {
    let controller = controller();
    let probe = PathAddress::subsystem("probe");
    controller.execute(&Operation::add(probe.clone(), Value::Null)).unwrap();

    let result = controller.execute(&Operation::write_attribute(probe.clone(), "limit", json!(3))).unwrap();
    assert!(result.reload_required);
    assert_eq!(controller.read_model(&probe).unwrap()["limit"], json!(3));

    let rejected = controller.execute(&Operation::write_attribute(probe.clone(), "limit", json!(-1))).unwrap_err();
    assert!(matches!(rejected, OperationError::Invalid { .. }), "{rejected}");
    assert_eq!(controller.read_model(&probe).unwrap()["limit"], json!(3));

    let malformed = controller.execute(&Operation::new("write-attribute", probe, json!({ "value": 1 }))).unwrap_err();
    assert!(matches!(malformed, OperationError::Invalid { .. }), "{malformed}");
}

#[test]
fn test_composite_rolls_back_earlier_steps() {
    let controller = controller();

    let op = Operation::composite(vec![
        Operation::add(PathAddress::subsystem("probe"), Value::Null),
        Operation::add(PathAddress::subsystem("broken"), Value::Null),
    ]);
    let err = controller.execute(&op).unwrap_err();

    assert!(matches!(err, OperationError::Runtime { .. }), "{err}");
    assert_untouched(&controller);
    assert!(!controller.is_active("broken"));
}

#[test]
fn test_composite_collects_step_results() {
    let controller = controller();
    let probe = PathAddress::subsystem("probe");

    let op = Operation::composite(vec![
        Operation::add(probe.clone(), Value::Null),
        Operation::read_resource(probe.clone()),
    ]);
    let result = controller.execute(&op).unwrap();

    assert_eq!(result.result, json!([null, { "fail": false, "limit": 1 }]));
    assert!(controller.is_active("probe"));
}

#[test]
fn test_read_resource_root_lists_everything() {
    let controller = controller();
    controller.execute(&Operation::add(PathAddress::subsystem("probe"), Value::Null)).unwrap();

    let root = controller.execute(&Operation::read_resource(PathAddress::root())).unwrap();
    assert_eq!(root.result, json!({ "/subsystem=probe": { "fail": false, "limit": 1 } }));

    let missing = controller.execute(&Operation::read_resource(PathAddress::subsystem("broken"))).unwrap_err();
    assert!(matches!(missing, OperationError::NotFound { .. }), "{missing}");
}

#[test]
fn test_unknown_operation_and_wire_format() {
    let controller = controller();
    let err = controller.execute(&Operation::new("reboot", PathAddress::root(), Value::Null)).unwrap_err();
    assert!(matches!(err, OperationError::UnknownOperation { .. }), "{err}");

    let op: Operation = serde_json::from_value(json!({
        "operation": READ_RESOURCE,
        "address": "/subsystem=probe",
    }))
    .unwrap();
    assert_eq!(op, Operation::read_resource(PathAddress::subsystem("probe")));
    assert_eq!(serde_json::to_value(&op).unwrap()["address"], json!("/subsystem=probe"));
}
