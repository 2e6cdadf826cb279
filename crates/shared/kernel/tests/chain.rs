use dhub_kernel::prelude::*;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

struct Named {
    label: String,
    journal: Journal,
}

impl DeploymentUnitProcessor for Named {
    fn deploy(&self, ctx: &mut DeploymentPhaseContext<'_>) -> Result<(), DeploymentError> {
        self.journal.lock().unwrap().push(format!("{}@{}", self.label, ctx.priority()));
        Ok(())
    }

    fn undeploy(&self, _unit: &mut DeploymentUnit) {
        self.journal.lock().unwrap().push(format!("undo {}", self.label));
    }
}

fn named(label: &str, journal: &Journal) -> ProcessorRef {
    Arc::new(Named { label: label.to_owned(), journal: Arc::clone(journal) })
}

fn failing() -> ProcessorRef {
    Arc::new(FnProcessor::new("failing", |_: &mut DeploymentPhaseContext<'_>| {
        Err(DeploymentError::Internal { message: "boom".into(), context: None })
    }))
}

fn run(chain: &DeploymentChain) -> Result<(), DeploymentError> {
    chain.process_deployment(&mut DeploymentUnit::detached("app.jar"), &ServiceContainer::new())
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[test]
fn test_processors_run_in_ascending_priority() {
    let journal = Journal::default();
    let chain = DeploymentChain::new("test");
    chain.add_processor(named("A", &journal), 10);
    chain.add_processor(named("B", &journal), 5);
    chain.add_processor(named("C", &journal), 20);

    run(&chain).unwrap();

    assert_eq!(entries(&journal), ["B@5", "A@10", "C@20"]);
}

#[test]
fn test_same_processor_at_two_priorities() {
    let journal = Journal::default();
    let chain = DeploymentChain::new("test");
    let p = named("P", &journal);

    assert!(chain.add_processor(Arc::clone(&p), 1));
    assert!(chain.add_processor(Arc::clone(&p), 2));
    assert!(!chain.add_processor(Arc::clone(&p), 2), "exact pair already registered");
    assert_eq!(chain.len(), 2);

    assert!(chain.remove_processor(&p, 1));
    assert!(!chain.remove_processor(&p, 1), "second removal is a no-op");
    run(&chain).unwrap();

    assert_eq!(entries(&journal), ["P@2"]);
}

#[test]
fn test_failure_aborts_and_names_processor() {
    let journal = Journal::default();
    let chain = DeploymentChain::new("test");
    chain.add_processor(named("first", &journal), 1);
    chain.add_processor(failing(), 2);
    chain.add_processor(named("never", &journal), 3);

    let err = run(&chain).unwrap_err();

    assert_eq!(entries(&journal), ["first@1"]);
    assert_eq!(err.failed_priority(), Some(2));
    assert!(err.to_string().contains("failing"), "{err}");
    assert!(matches!(err.root_cause(), DeploymentError::Internal { .. }));
}

#[test]
fn test_undeploy_below_failed_priority_runs_descending() {
    let journal = Journal::default();
    let chain = DeploymentChain::new("test");
    chain.add_processor(named("a", &journal), 1);
    chain.add_processor(named("b", &journal), 2);
    chain.add_processor(named("c", &journal), 3);
    let mut unit = DeploymentUnit::detached("app.jar");

    chain.undeploy(&mut unit, Some(3));
    assert_eq!(entries(&journal), ["undo b", "undo a"]);

    journal.lock().unwrap().clear();
    chain.undeploy(&mut unit, None);
    assert_eq!(entries(&journal), ["undo c", "undo b", "undo a"]);
}

#[test]
fn test_recorded_run_undoes_exactly_what_completed() {
    let journal = Journal::default();
    let chain = DeploymentChain::new("test");
    chain.add_processor(named("a", &journal), 1);
    chain.add_processor(named("b", &journal), 2);
    chain.add_processor(failing(), 3);
    chain.add_processor(named("c", &journal), 4);
    let mut unit = DeploymentUnit::detached("app.jar");
    let mut completed = Vec::new();

    chain.process_recorded(&mut unit, &ServiceContainer::new(), &mut completed).unwrap_err();
    let priorities: Vec<i64> = completed.iter().map(OrderedProcessor::priority).collect();
    assert_eq!(priorities, [1, 2]);

    chain.add_processor(named("added later", &journal), 0);
    journal.lock().unwrap().clear();
    chain.undo_completed(&mut unit, &completed);

    assert_eq!(entries(&journal), ["undo b", "undo a"]);
}

#[test]
fn test_mutation_during_processing_applies_next_time() {
    let journal = Journal::default();
    let chain = Arc::new(DeploymentChain::new("test"));
    let late = named("late", &journal);

    let adder = {
        let chain = Arc::downgrade(&chain);
        let late = Arc::clone(&late);
        Arc::new(FnProcessor::new("adder", move |_: &mut DeploymentPhaseContext<'_>| {
            if let Some(chain) = chain.upgrade() {
                chain.add_processor(Arc::clone(&late), 100);
            }
            Ok(())
        }))
    };
    chain.add_processor(adder, 1);

    run(&chain).unwrap();
    assert!(entries(&journal).is_empty());

    run(&chain).unwrap();
    assert_eq!(entries(&journal), ["late@100"]);
}

#[test]
fn test_phase_context_exposes_phase() {
    let chain = DeploymentChain::new("test");
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    chain.add_processor(
        Arc::new(FnProcessor::new("phase", move |ctx: &mut DeploymentPhaseContext<'_>| {
            *sink.lock().unwrap() = ctx.phase();
            Ok(())
        })),
        Phase::Install.priority(slots::INSTALL_MODULE),
    );

    run(&chain).unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(Phase::Install));
}

proptest! {
    #[test]
    fn prop_invocation_order_is_sorted_and_repeatable(priorities in prop::collection::btree_set(-1000i64..1000, 1..16)) {
        let journal = Journal::default();
        let chain = DeploymentChain::new("prop");
        // Insert in descending order so registration order never matches execution order.
        for priority in priorities.iter().rev() {
            chain.add_processor(named(&priority.to_string(), &journal), *priority);
        }

        run(&chain).unwrap();
        let first = entries(&journal);
        journal.lock().unwrap().clear();
        run(&chain).unwrap();

        let expected: Vec<String> = priorities.iter().map(|p| format!("{p}@{p}")).collect();
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(entries(&journal), expected);
    }
}
