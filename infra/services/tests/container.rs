use dhub_services::{
    Service, ServiceContainer, ServiceError, ServiceMode, ServiceName, ServiceState, StartContext,
};
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    label: &'static str,
    journal: Journal,
    fail: bool,
}

impl Recorder {
    fn new(label: &'static str, journal: &Journal) -> Self {
        Self { label, journal: Arc::clone(journal), fail: false }
    }

    fn failing(label: &'static str, journal: &Journal) -> Self {
        Self { fail: true, ..Self::new(label, journal) }
    }
}

impl Service for Recorder {
    fn start(&self, _: &StartContext<'_>) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::StartFailed { message: "refused".into(), context: None });
        }
        self.journal.lock().unwrap().push(format!("start {}", self.label));
        Ok(())
    }

    fn stop(&self) {
        self.journal.lock().unwrap().push(format!("stop {}", self.label));
    }
}

fn name(simple: &str) -> ServiceName {
    ServiceName::of(["test", simple])
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[test]
fn test_service_waits_for_dependency() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    let state = container
        .add_service(name("web"), Recorder::new("web", &journal))
        .add_dependency(name("host"))
        .install()
        .unwrap();
    assert_eq!(state, ServiceState::Waiting);
    assert_eq!(container.missing_dependencies().get(&name("web")), Some(&vec![name("host")]));

    container.add_service(name("host"), Recorder::new("host", &journal)).install().unwrap();

    assert_eq!(container.state(&name("web")), Some(ServiceState::Up));
    assert_eq!(entries(&journal), ["start host", "start web"]);
    assert!(container.missing_dependencies().is_empty());
}

#[test]
fn test_failed_start_keeps_dependents_waiting() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    container.add_service(name("db"), Recorder::failing("db", &journal)).install().unwrap();
    container
        .add_service(name("app"), Recorder::new("app", &journal))
        .add_dependency(name("db"))
        .install()
        .unwrap();

    assert_eq!(container.state(&name("db")), Some(ServiceState::Failed));
    assert_eq!(container.state(&name("app")), Some(ServiceState::Waiting));
    assert!(container.failed()[&name("db")].contains("refused"));
}

#[test]
fn test_duplicate_and_cycle_rejected() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    container
        .add_service(name("a"), Recorder::new("a", &journal))
        .add_dependency(name("b"))
        .install()
        .unwrap();

    let dup = container.add_service(name("a"), Recorder::new("a", &journal)).install();
    assert!(matches!(dup, Err(ServiceError::Duplicate { .. })));

    let cycle = container
        .add_service(name("b"), Recorder::new("b", &journal))
        .add_dependency(name("a"))
        .install();
    assert!(matches!(cycle, Err(ServiceError::Cycle { .. })));

    let self_cycle = container
        .add_service(name("c"), Recorder::new("c", &journal))
        .add_dependency(name("c"))
        .install();
    assert!(matches!(self_cycle, Err(ServiceError::Cycle { .. })));
    assert!(!container.contains(&name("b")));
}

#[test]
fn test_remove_stops_dependents_first() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    container.add_service(name("host"), Recorder::new("host", &journal)).install().unwrap();
    container
        .add_service(name("ctx"), Recorder::new("ctx", &journal))
        .add_dependency(name("host"))
        .install()
        .unwrap();
    container
        .add_service(name("servlet"), Recorder::new("servlet", &journal))
        .add_dependency(name("ctx"))
        .install()
        .unwrap();

    container.remove(&name("host")).unwrap();

    assert_eq!(
        entries(&journal)[3..],
        ["stop servlet", "stop ctx", "stop host"].map(String::from)
    );
    assert_eq!(container.state(&name("ctx")), Some(ServiceState::Waiting));
    assert_eq!(container.state(&name("servlet")), Some(ServiceState::Waiting));
    assert!(matches!(container.remove(&name("host")), Err(ServiceError::NotFound { .. })));
}

#[test]
fn test_remove_children_clears_subtree() {
    let journal = Journal::default();
    let container = ServiceContainer::new();
    let unit = ServiceName::of(["dhub", "deployment", "unit", "app.ear"]);

    container.add_service(name("host"), Recorder::new("host", &journal)).install().unwrap();
    container.add_service(unit.clone(), Recorder::new("unit", &journal)).install().unwrap();
    container
        .add_service(unit.append("web.war"), Recorder::new("child", &journal))
        .add_dependency(unit.clone())
        .add_dependency(name("host"))
        .install()
        .unwrap();

    assert_eq!(container.remove_children(&unit), 2);
    assert_eq!(container.names(), vec![name("host")]);
    assert_eq!(entries(&journal)[3..], ["stop child", "stop unit"].map(String::from));
}

#[test]
fn test_mode_never_takes_service_down_and_active_restarts() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    container.add_service(name("svc"), Recorder::new("svc", &journal)).install().unwrap();
    container.set_mode(&name("svc"), ServiceMode::Never).unwrap();
    assert_eq!(container.state(&name("svc")), Some(ServiceState::Down));

    container.set_mode(&name("svc"), ServiceMode::Active).unwrap();
    assert_eq!(container.state(&name("svc")), Some(ServiceState::Up));
    assert_eq!(entries(&journal), ["start svc", "stop svc", "start svc"]);
}

struct Port(u16);

impl Service for Port {
    fn start(&self, _: &StartContext<'_>) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct Listener {
    bound: Mutex<Option<u16>>,
}

impl Service for Listener {
    fn start(&self, ctx: &StartContext<'_>) -> Result<(), ServiceError> {
        let port = ctx.dependency::<Port>(&name("port"))?;
        *self.bound.lock().unwrap() = Some(port.0);
        Ok(())
    }
}

#[test]
fn test_start_context_exposes_dependency_values() {
    let container = ServiceContainer::new();
    container.add_service(name("port"), Port(8080)).install().unwrap();
    container
        .add_service(name("listener"), Listener { bound: Mutex::new(None) })
        .add_dependency(name("port"))
        .install()
        .unwrap();

    let listener = container.value::<Listener>(&name("listener")).unwrap();
    assert_eq!(*listener.bound.lock().unwrap(), Some(8080));
    assert!(container.value::<Port>(&name("listener")).is_none());
}

#[test]
fn test_undeclared_dependency_fails_start() {
    let container = ServiceContainer::new();
    container.add_service(name("port"), Port(1)).install().unwrap();

    let state = container
        .add_service(name("listener"), Listener { bound: Mutex::new(None) })
        .install()
        .unwrap();

    assert_eq!(state, ServiceState::Failed);
    assert!(container.failed()[&name("listener")].contains("not a dependency"));
}

#[test]
fn test_shutdown_stops_in_reverse_dependency_order() {
    let journal = Journal::default();
    let container = ServiceContainer::new();

    container.add_service(name("a"), Recorder::new("a", &journal)).install().unwrap();
    container
        .add_service(name("b"), Recorder::new("b", &journal))
        .add_dependency(name("a"))
        .install()
        .unwrap();

    assert_eq!(container.shutdown(), 2);
    assert!(container.is_empty());
    assert_eq!(entries(&journal), ["start a", "start b", "stop b", "stop a"]);
}
