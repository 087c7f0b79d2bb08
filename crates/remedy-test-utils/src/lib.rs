//! Testing utilities for the Remedy workspace
//!
//! Shared fixtures and scripted executors.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use remedy_executor::{Executor, ExecutorError, ExecutorRegistry};
use remedy_model::{Action, ActionOutcome, AffectedResource, Incident, Plan, RawEvent, Severity};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn create_crashloop_event() -> RawEvent {
    RawEvent::new(json!({
        "kind": "Pod",
        "name": "prod/bad-pod",
        "reason": "CrashLoopBackOff",
        "message": "boom",
    }))
}

pub fn create_incident() -> Incident {
    Incident::new(
        AffectedResource::new("Pod", "bad-pod", "prod"),
        "CrashLoopBackOff",
        "boom",
        Severity::Critical,
    )
    .with_event(create_crashloop_event())
}

pub fn create_action(id: &str, executor: &str) -> Action {
    Action::new(executor, "delete pod")
        .with_id(id)
        .with_param("name", "bad-pod")
        .with_param("namespace", "prod")
}

pub fn create_plan(incident: &Incident, executors: &[&str]) -> Plan {
    let actions = executors
        .iter()
        .enumerate()
        .map(|(i, executor)| create_action(&format!("step-{}", i + 1), executor))
        .collect();
    Plan::new(incident.id, actions)
}

/// What a [`ScriptedExecutor`] does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Outcome(ActionOutcome),
    Error(ExecutorError),
    Panic(String),
}

/// Executor replaying a fixed script; the last step repeats forever
#[derive(Debug)]
pub struct ScriptedExecutor {
    name: String,
    steps: Vec<Step>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Action>>,
}

impl ScriptedExecutor {
    pub fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        assert!(!steps.is_empty(), "scripted executor needs at least one step");
        Arc::new(Self {
            name: name.to_string(),
            steps,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always_succeed(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Outcome(ActionOutcome::success("ok"))])
    }

    pub fn always_fail(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Outcome(ActionOutcome::failure("backend said no"))])
    }

    pub fn always_pending(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Outcome(ActionOutcome::pending("accepted"))])
    }

    /// Fails `failures` times, then succeeds
    pub fn succeed_after(name: &str, failures: usize) -> Arc<Self> {
        let mut steps = vec![Step::Outcome(ActionOutcome::failure("not yet")); failures];
        steps.push(Step::Outcome(ActionOutcome::success("ok")));
        Self::new(name, steps)
    }

    pub fn erroring(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Error(ExecutorError::Unexpected("socket vanished".into()))])
    }

    pub fn panicking(name: &str) -> Arc<Self> {
        Self::new(name, vec![Step::Panic("executor blew up".into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Action> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn executor_type(&self) -> &str {
        &self.name
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ExecutorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(action.clone());
        let step = self.steps.get(call).or(self.steps.last()).cloned();
        match step {
            Some(Step::Outcome(outcome)) => Ok(outcome),
            Some(Step::Error(err)) => Err(err),
            Some(Step::Panic(msg)) => panic!("{msg}"),
            None => unreachable!("steps are never empty"),
        }
    }
}

/// Registry serving the given executors under their names
pub fn create_registry(executors: &[Arc<ScriptedExecutor>]) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    for executor in executors {
        let executor = Arc::clone(executor);
        let name = executor.name.clone();
        registry.register(&name, move |_| Ok(Arc::clone(&executor) as Arc<dyn Executor>));
    }
    registry
}
