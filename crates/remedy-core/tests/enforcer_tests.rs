//! Retry, fail-fast, deadline and locking behavior of enforcement

use async_trait::async_trait;
use proptest::prelude::*;
use remedy_core::{
    EnforceError, Enforcer, EnforcerConfig, ExecutorConfigBundle, RemediationSink, Remediator,
    SinkError,
};
use remedy_executor::{Executor, ExecutorError, ExecutorRegistry};
use remedy_model::{
    Action, ActionOutcome, ExecutionResult, Incident, IncidentStatus, Plan,
};
use remedy_test_utils::{create_incident, create_plan, create_registry, ScriptedExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn enforcer(executors: &[Arc<ScriptedExecutor>], config: EnforcerConfig) -> Enforcer {
    Enforcer::new(
        Arc::new(create_registry(executors)),
        Arc::new(ExecutorConfigBundle::new()),
    )
    .with_config(config)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_persistent_failure_yields_n_plus_one_results(max_retries in 0u32..8) {
        let bad = ScriptedExecutor::always_fail("bad");
        let enforcer = enforcer(
            &[bad.clone()],
            EnforcerConfig::new().with_max_retries(max_retries).with_retry_delay(Duration::ZERO),
        );
        let mut incident = create_incident();
        let plan = create_plan(&incident, &["bad"]);

        let results = runtime().block_on(enforcer.enforce(&plan, &mut incident)).unwrap();

        prop_assert_eq!(results.len(), max_retries as usize + 1);
        prop_assert_eq!(bad.calls(), max_retries as usize + 1);
        prop_assert_eq!(incident.status(), IncidentStatus::FailedRemediation);
    }

    #[test]
    fn prop_first_permanent_failure_skips_the_rest(max_retries in 0u32..4, trailing in 1usize..4) {
        let bad = ScriptedExecutor::always_fail("bad");
        let ok = ScriptedExecutor::always_succeed("ok");
        let enforcer = enforcer(
            &[bad, ok.clone()],
            EnforcerConfig::new().with_max_retries(max_retries).with_retry_delay(Duration::ZERO),
        );
        let mut incident = create_incident();
        let mut executors = vec!["bad"];
        executors.extend(std::iter::repeat("ok").take(trailing));
        let plan = create_plan(&incident, &executors);

        let results = runtime().block_on(enforcer.enforce(&plan, &mut incident)).unwrap();

        prop_assert!(results.iter().all(|r| r.action_id.as_str() == "step-1"));
        prop_assert_eq!(ok.calls(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_delay_between_attempts() {
    let bad = ScriptedExecutor::always_fail("bad");
    let enforcer = enforcer(
        &[bad],
        EnforcerConfig::new()
            .with_max_retries(2)
            .with_retry_delay(Duration::from_secs(5)),
    );
    let mut incident = create_incident();
    let plan = create_plan(&incident, &["bad"]);

    let started = tokio::time::Instant::now();
    let results = enforcer.enforce(&plan, &mut incident).await.unwrap();

    assert_eq!(results.len(), 3);
    // two pauses, none after the final attempt
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_success_does_not_wait() {
    let enforcer = enforcer(
        &[ScriptedExecutor::always_succeed("ok")],
        EnforcerConfig::new().with_retry_delay(Duration::from_secs(5)),
    );
    let mut incident = create_incident();
    let plan = create_plan(&incident, &["ok", "ok", "ok"]);

    let started = tokio::time::Instant::now();
    enforcer.enforce(&plan, &mut incident).await.unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
}

struct RejectingSink;

#[async_trait]
impl RemediationSink for RejectingSink {
    async fn record_transition(
        &self,
        _: &Incident,
        _: IncidentStatus,
        _: IncidentStatus,
    ) -> Result<(), SinkError> {
        Err(SinkError::Backend("database offline".into()))
    }

    async fn record_result(&self, _: &ExecutionResult) -> Result<(), SinkError> {
        Err(SinkError::Backend("database offline".into()))
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_change_outcome() {
    let enforcer = enforcer(&[ScriptedExecutor::always_succeed("ok")], EnforcerConfig::new())
        .with_sink(Arc::new(RejectingSink));
    let mut incident = create_incident();
    let plan = create_plan(&incident, &["ok"]);

    let results = enforcer.enforce(&plan, &mut incident).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(incident.status(), IncidentStatus::Resolved);
}

/// Sleeps, tracking how many calls overlap
#[derive(Debug, Default)]
struct SlowExecutor {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Executor for SlowExecutor {
    fn executor_type(&self) -> &str {
        "slow"
    }

    async fn execute(&self, _action: &Action) -> Result<ActionOutcome, ExecutorError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(ActionOutcome::success("done"))
    }
}

fn slow_remediator(slow: &Arc<SlowExecutor>, deadline: Option<Duration>) -> Remediator {
    let mut registry = ExecutorRegistry::new();
    let executor = Arc::clone(slow);
    registry.register("slow", move |_| Ok(Arc::clone(&executor) as Arc<dyn Executor>));
    let builder = Remediator::builder().registry(Arc::new(registry));
    match deadline {
        Some(deadline) => builder.deadline(deadline).build(),
        None => builder.build(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_marks_incident_failed() {
    let slow = Arc::new(SlowExecutor {
        delay: Duration::from_secs(60),
        ..SlowExecutor::default()
    });
    let remediator = slow_remediator(&slow, Some(Duration::from_secs(10)));
    let mut incident = create_incident();
    let plan = create_plan(&incident, &["slow"]);

    let err = remediator.enforce(&plan, &mut incident).await.unwrap_err();

    assert!(matches!(err, EnforceError::DeadlineExceeded { deadline, .. } if deadline == Duration::from_secs(10)));
    assert_eq!(incident.status(), IncidentStatus::FailedRemediation);
    assert_eq!(remediator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_same_incident_runs_are_serialized() {
    let slow = Arc::new(SlowExecutor {
        delay: Duration::from_secs(1),
        ..SlowExecutor::default()
    });
    let remediator = slow_remediator(&slow, None);

    let mut first = create_incident();
    let mut second = first.clone();
    let plan = create_plan(&first, &["slow"]);

    let (a, b) = tokio::join!(
        remediator.enforce(&plan, &mut first),
        remediator.enforce(&plan, &mut second)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    assert_eq!(remediator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_different_incidents_run_concurrently() {
    let slow = Arc::new(SlowExecutor {
        delay: Duration::from_secs(1),
        ..SlowExecutor::default()
    });
    let remediator = slow_remediator(&slow, None);

    let mut first = create_incident();
    let mut second = create_incident();
    let first_plan = create_plan(&first, &["slow"]);
    let second_plan = create_plan(&second, &["slow"]);

    let started = tokio::time::Instant::now();
    let (a, b) = tokio::join!(
        remediator.enforce(&first_plan, &mut first),
        remediator.enforce(&second_plan, &mut second)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(slow.peak.load(Ordering::SeqCst), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_plan_for_other_incident_is_rejected() {
    let enforcer = enforcer(&[ScriptedExecutor::always_succeed("ok")], EnforcerConfig::new());
    let other = create_incident();
    let plan: Plan = create_plan(&other, &["ok"]);
    let mut incident = create_incident();

    let err = enforcer.enforce(&plan, &mut incident).await.unwrap_err();
    assert!(matches!(err, EnforceError::InvalidPlan(_)));
    assert_eq!(incident.status(), IncidentStatus::Open);
}
