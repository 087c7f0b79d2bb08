//! Plan enforcement
//!
//! Runs a plan's actions strictly in order against executors resolved from
//! the registry, driving the incident through its lifecycle.
//!
//! # Retry rules
//!
//! | attempt produced                  | recorded      | then                      |
//! |-----------------------------------|---------------|---------------------------|
//! | `success` outcome                 | 1 result      | next action               |
//! | `failure` / `pending` outcome     | 1 result      | retry after `retry_delay` |
//! | retries exhausted                 |               | abort the plan            |
//! | `ResolutionError`                 | 1 failure     | abort, no retry           |
//! | `ExecutorError` or panic          | 1 failure     | abort, no retry           |
//!
//! An action gets at most `max_retries + 1` attempts. The incident ends
//! `resolved` when every action succeeded and `failed_remediation` otherwise.

use crate::plan::{validate_plan, PlanValidationError};
use crate::sink::{NoopSink, RemediationSink};
use futures::FutureExt;
use remedy_executor::{ExecutorConfigBundle, ExecutorError, ExecutorRegistry};
use remedy_model::{
    Action, ActionOutcome, ExecutionResult, Incident, IncidentId, IncidentStatus, Plan,
    TransitionError,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Extra attempts after the first non-success
    pub max_retries: u32,
    /// Pause between a non-success attempt and the next
    pub retry_delay: Duration,
}

impl EnforcerConfig {
    /// Create default config
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With retry delay
    #[inline]
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Enforcement could not run to a verdict
#[derive(Debug, thiserror::Error)]
pub enum EnforceError {
    /// Plan broke the contract; incident untouched
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanValidationError),

    /// Incident is not in a state that allows enforcement
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Overall deadline elapsed; incident marked `failed_remediation`
    #[error("enforcement of incident {incident_id} exceeded its {deadline:?} deadline")]
    DeadlineExceeded {
        /// Incident being enforced
        incident_id: IncidentId,
        /// Configured deadline
        deadline: Duration,
    },
}

/// Retry and state engine
#[derive(Clone)]
pub struct Enforcer {
    registry: Arc<ExecutorRegistry>,
    bundle: Arc<ExecutorConfigBundle>,
    config: EnforcerConfig,
    sink: Arc<dyn RemediationSink>,
}

impl Enforcer {
    /// Create enforcer with default retry policy and no sink
    #[must_use]
    pub fn new(registry: Arc<ExecutorRegistry>, bundle: Arc<ExecutorConfigBundle>) -> Self {
        Self {
            registry,
            bundle,
            config: EnforcerConfig::default(),
            sink: Arc::new(NoopSink),
        }
    }

    /// With retry policy
    #[must_use]
    pub fn with_config(mut self, config: EnforcerConfig) -> Self {
        self.config = config;
        self
    }

    /// With sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RemediationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Retry policy in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> EnforcerConfig {
        self.config
    }

    /// Registry executors are resolved from
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Sink receiving results and transitions
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn RemediationSink> {
        &self.sink
    }

    /// Enforce `plan` against `incident`
    ///
    /// Returns every execution result in the order attempts finished,
    /// including those of an aborted run.
    ///
    /// # Errors
    /// - `InvalidPlan` before any status change
    /// - `Transition` when the incident cannot enter `remediating` (already
    ///   resolved, or a run is in progress)
    pub async fn enforce(
        &self,
        plan: &Plan,
        incident: &mut Incident,
    ) -> Result<Vec<ExecutionResult>, EnforceError> {
        validate_plan(plan, incident.id)?;

        let span = tracing::info_span!(
            "enforce",
            incident_id = %incident.id,
            plan_id = %plan.id(),
            actions = plan.len()
        );
        self.run(plan, incident).instrument(span).await
    }

    async fn run(
        &self,
        plan: &Plan,
        incident: &mut Incident,
    ) -> Result<Vec<ExecutionResult>, EnforceError> {
        self.transition(incident, IncidentStatus::Remediating).await?;
        tracing::info!("enforcement started");

        let mut results = Vec::new();
        let mut completed = true;
        for action in plan.actions() {
            if !self.run_action(plan, action, &mut results).await {
                completed = false;
                break;
            }
        }

        let verdict = if completed {
            IncidentStatus::Resolved
        } else {
            IncidentStatus::FailedRemediation
        };
        self.transition(incident, verdict).await?;
        tracing::info!(status = %verdict, results = results.len(), "enforcement finished");
        Ok(results)
    }

    /// Attempt one action until success or abort; `false` aborts the plan
    async fn run_action(
        &self,
        plan: &Plan,
        action: &Action,
        results: &mut Vec<ExecutionResult>,
    ) -> bool {
        let max_attempts = self.config.max_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let executor = match self.registry.resolve(&action.executor, &self.bundle).await {
                Ok(executor) => executor,
                Err(err) => {
                    tracing::error!(action_id = %action.action_id, error = %err, "executor resolution failed, aborting plan");
                    let outcome = ActionOutcome::failure(format!("configuration error: {err}"));
                    self.record(plan, action, attempt, outcome, results).await;
                    return false;
                }
            };

            tracing::debug!(action_id = %action.action_id, attempt, executor = executor.executor_type(), "executing action");
            let outcome = match AssertUnwindSafe(executor.execute(action)).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => return self.abort(plan, action, attempt, &err, results).await,
                Err(panic) => {
                    let err = ExecutorError::Panicked(panic_message(panic.as_ref()));
                    return self.abort(plan, action, attempt, &err, results).await;
                }
            };

            let status = outcome.status;
            self.record(plan, action, attempt, outcome, results).await;
            if status.is_success() {
                return true;
            }

            if attempt < max_attempts {
                tracing::warn!(action_id = %action.action_id, attempt, %status, "action did not succeed, retrying");
                tokio::time::sleep(self.config.retry_delay).await;
            } else {
                tracing::error!(action_id = %action.action_id, attempts = attempt, %status, "retries exhausted, aborting plan");
            }
        }
        false
    }

    async fn abort(
        &self,
        plan: &Plan,
        action: &Action,
        attempt: u32,
        err: &ExecutorError,
        results: &mut Vec<ExecutionResult>,
    ) -> bool {
        tracing::error!(action_id = %action.action_id, attempt, error = %err, "executor failed unexpectedly, aborting plan");
        self.record(plan, action, attempt, ActionOutcome::failure(err.to_string()), results)
            .await;
        false
    }

    async fn record(
        &self,
        plan: &Plan,
        action: &Action,
        attempt: u32,
        outcome: ActionOutcome,
        results: &mut Vec<ExecutionResult>,
    ) {
        let result = ExecutionResult::record(plan.id(), action.action_id.clone(), attempt, outcome);
        if let Err(err) = self.sink.record_result(&result).await {
            tracing::warn!(execution_id = %result.execution_id, error = %err, "sink rejected execution result");
        }
        results.push(result);
    }

    async fn transition(
        &self,
        incident: &mut Incident,
        to: IncidentStatus,
    ) -> Result<(), TransitionError> {
        let from = incident.transition_to(to)?;
        if let Err(err) = self.sink.record_transition(incident, from, to).await {
            tracing::warn!(incident_id = %incident.id, %from, %to, error = %err, "sink rejected transition");
        }
        Ok(())
    }

    /// Mark an interrupted run as failed (deadline expiry)
    pub(crate) async fn fail_interrupted(&self, incident: &mut Incident) {
        if incident.status() == IncidentStatus::Remediating {
            if let Err(err) = self.transition(incident, IncidentStatus::FailedRemediation).await {
                tracing::error!(incident_id = %incident.id, error = %err, "could not mark interrupted run");
            }
        }
    }
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enforcer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
