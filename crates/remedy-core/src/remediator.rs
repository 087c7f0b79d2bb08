//! Host façade
//!
//! [`Remediator`] runs the whole pipeline for one event: normalize, plan,
//! enforce. Enforcement of a given incident is serialized; runs for different
//! incidents proceed concurrently.

use crate::config::RemedyConfig;
use crate::enforcer::{EnforceError, Enforcer, EnforcerConfig};
use crate::error::RemedyError;
use crate::normalizer::Normalizer;
use crate::plan::{PlanGenerator, RulePlanGenerator};
use crate::sink::{NoopSink, RemediationSink};
use dashmap::DashMap;
use remedy_executor::{ExecutorConfigBundle, ExecutorRegistry};
use remedy_model::{ExecutionResult, Incident, IncidentId, IncidentStatus, Plan, RawEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Everything produced by one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport {
    /// Incident in its final state
    pub incident: Incident,
    /// Plan that was enforced
    pub plan: Plan,
    /// Every attempt, in order
    pub results: Vec<ExecutionResult>,
}

impl RemediationReport {
    /// Whether the incident ended resolved
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.incident.status() == IncidentStatus::Resolved
    }
}

/// Normalizer, generator and enforcer wired together
pub struct Remediator {
    normalizer: Normalizer,
    generator: Arc<dyn PlanGenerator>,
    enforcer: Enforcer,
    locks: DashMap<IncidentId, Arc<Mutex<()>>>,
    deadline: Option<Duration>,
}

impl Remediator {
    /// Start building a remediator
    #[inline]
    #[must_use]
    pub fn builder() -> RemediatorBuilder {
        RemediatorBuilder::default()
    }

    /// Normalizer in use
    #[inline]
    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Enforcer in use
    #[inline]
    #[must_use]
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    /// Number of incidents with an enforcement run in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Normalize, plan and enforce one event
    ///
    /// # Errors
    /// [`RemedyError`] from whichever stage failed.
    pub async fn handle_event(&self, event: RawEvent) -> Result<RemediationReport, RemedyError> {
        let mut incident = self.normalizer.normalize(event)?;
        let plan = self.generator.generate(&incident).await?;
        let results = self.enforce(&plan, &mut incident).await?;
        Ok(RemediationReport {
            incident,
            plan,
            results,
        })
    }

    /// Enforce under the per-incident lock and the optional deadline
    ///
    /// # Errors
    /// Whatever [`Enforcer::enforce`] reports, plus
    /// `EnforceError::DeadlineExceeded` when the deadline elapses. In that
    /// case the incident is left `failed_remediation`.
    pub async fn enforce(
        &self,
        plan: &Plan,
        incident: &mut Incident,
    ) -> Result<Vec<ExecutionResult>, EnforceError> {
        let incident_id = incident.id;
        let lock = Arc::clone(&self.locks.entry(incident_id).or_default());

        let result = {
            let _guard = lock.lock().await;
            self.enforce_with_deadline(plan, incident).await
        };

        drop(lock);
        // only the map holds the lock now unless another run is queued on it
        self.locks
            .remove_if(&incident_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn enforce_with_deadline(
        &self,
        plan: &Plan,
        incident: &mut Incident,
    ) -> Result<Vec<ExecutionResult>, EnforceError> {
        let Some(deadline) = self.deadline else {
            return self.enforcer.enforce(plan, incident).await;
        };

        let outcome = tokio::time::timeout(deadline, self.enforcer.enforce(plan, incident))
            .await
            .ok();
        match outcome {
            Some(result) => result,
            None => {
                tracing::error!(incident_id = %incident.id, ?deadline, "enforcement deadline exceeded");
                self.enforcer.fail_interrupted(incident).await;
                Err(EnforceError::DeadlineExceeded {
                    incident_id: incident.id,
                    deadline,
                })
            }
        }
    }
}

impl std::fmt::Debug for Remediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remediator")
            .field("normalizer", &self.normalizer)
            .field("enforcer", &self.enforcer)
            .field("in_flight", &self.locks.len())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Remediator`]
///
/// Defaults: default normalizer, [`RulePlanGenerator::default`], built-in
/// executors, empty bundle, default retry policy, [`NoopSink`], no deadline.
#[derive(Default)]
pub struct RemediatorBuilder {
    normalizer: Option<Normalizer>,
    generator: Option<Arc<dyn PlanGenerator>>,
    registry: Option<Arc<ExecutorRegistry>>,
    bundle: ExecutorConfigBundle,
    config: EnforcerConfig,
    sink: Option<Arc<dyn RemediationSink>>,
    deadline: Option<Duration>,
}

impl RemediatorBuilder {
    /// Builder pre-filled from host configuration
    #[must_use]
    pub fn from_config(config: &RemedyConfig) -> Self {
        let mut builder = Self::default()
            .bundle(config.executors.clone())
            .config(config.enforcer.enforcer_config());
        builder.deadline = config.enforcer.deadline();
        if let Some(rules) = &config.severity_rules {
            builder = builder.normalizer(Normalizer::with_severity_rules(rules.clone()));
        }
        if let Some(rules) = &config.plan_rules {
            builder = builder.generator(Arc::new(RulePlanGenerator::new(rules.clone())));
        }
        builder
    }

    /// With normalizer
    #[must_use]
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// With plan generator
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// With executor registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<ExecutorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// With executor configuration bundle
    #[must_use]
    pub fn bundle(mut self, bundle: ExecutorConfigBundle) -> Self {
        self.bundle = bundle;
        self
    }

    /// With retry policy
    #[must_use]
    pub fn config(mut self, config: EnforcerConfig) -> Self {
        self.config = config;
        self
    }

    /// With sink
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn RemediationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// With overall per-run deadline
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build the remediator
    #[must_use]
    pub fn build(self) -> Remediator {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ExecutorRegistry::with_builtins()));
        let enforcer = Enforcer::new(registry, Arc::new(self.bundle))
            .with_config(self.config)
            .with_sink(self.sink.unwrap_or_else(|| Arc::new(NoopSink)));

        Remediator {
            normalizer: self.normalizer.unwrap_or_default(),
            generator: self
                .generator
                .unwrap_or_else(|| Arc::new(RulePlanGenerator::default())),
            enforcer,
            locks: DashMap::new(),
            deadline: self.deadline,
        }
    }
}
