//! Two-phase plan generation: outline, then command resolution
//!
//! Only fully resolved plans leave this module. A draft whose command is
//! still missing after resolution fails generation instead of being enforced.

use super::{validate_plan, PlanGenerationError, PlanGenerator};
use async_trait::async_trait;
use remedy_executor::normalize_command;
use remedy_model::{Action, Incident, Parameters, Plan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A planned step that may still lack a concrete command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    /// Target executor type
    pub executor: String,
    /// High-level description of what the step should achieve
    pub intent: String,
    /// Concrete command, when the outline already knows it
    #[serde(default)]
    pub command: Option<String>,
    /// Executor parameters
    #[serde(default)]
    pub parameters: Parameters,
}

impl ActionDraft {
    /// Draft with an intent only
    #[must_use]
    pub fn new(executor: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            executor: executor.into(),
            intent: intent.into(),
            command: None,
            parameters: Parameters::new(),
        }
    }

    /// With a known command
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// With one parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    fn has_command(&self) -> bool {
        self.command.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Outline phase: what should be done for an incident
#[async_trait]
pub trait OutlineSource: Send + Sync {
    /// Ordered drafts for the incident
    async fn outline(&self, incident: &Incident) -> Result<Vec<ActionDraft>, PlanGenerationError>;
}

/// Resolution phase: intent to concrete command
#[async_trait]
pub trait CommandResolver: Send + Sync {
    /// Command for a draft, `None` when the resolver has no answer
    async fn resolve(
        &self,
        incident: &Incident,
        draft: &ActionDraft,
    ) -> Result<Option<String>, PlanGenerationError>;
}

/// Resolver backed by a fixed (executor, intent) to command table
///
/// Intents are compared after [`normalize_command`], so `Restart Deployment`
/// and `restart-deployment` hit the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentTable {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl IntentTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With one entry
    #[must_use]
    pub fn with(mut self, executor: &str, intent: &str, command: impl Into<String>) -> Self {
        self.entries
            .entry(executor.trim().to_ascii_lowercase())
            .or_default()
            .insert(normalize_command(intent), command.into());
        self
    }

    /// Look up a command
    #[must_use]
    pub fn lookup(&self, executor: &str, intent: &str) -> Option<&str> {
        self.entries
            .get(&executor.trim().to_ascii_lowercase())?
            .get(&normalize_command(intent))
            .map(String::as_str)
    }
}

#[async_trait]
impl CommandResolver for IntentTable {
    async fn resolve(
        &self,
        _incident: &Incident,
        draft: &ActionDraft,
    ) -> Result<Option<String>, PlanGenerationError> {
        Ok(self.lookup(&draft.executor, &draft.intent).map(str::to_string))
    }
}

/// Outline plus resolver
#[derive(Clone)]
pub struct ResolvingPlanGenerator {
    outline: Arc<dyn OutlineSource>,
    resolver: Arc<dyn CommandResolver>,
}

impl ResolvingPlanGenerator {
    /// Create generator from its two phases
    #[must_use]
    pub fn new(outline: Arc<dyn OutlineSource>, resolver: Arc<dyn CommandResolver>) -> Self {
        Self { outline, resolver }
    }
}

impl std::fmt::Debug for ResolvingPlanGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvingPlanGenerator").finish_non_exhaustive()
    }
}

#[async_trait]
impl PlanGenerator for ResolvingPlanGenerator {
    async fn generate(&self, incident: &Incident) -> Result<Plan, PlanGenerationError> {
        let drafts = self.outline.outline(incident).await?;

        let mut actions = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let command = if draft.has_command() {
                draft.command.clone()
            } else {
                self.resolver.resolve(incident, &draft).await?
            };
            let command = command
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| PlanGenerationError::Unresolved {
                    executor: draft.executor.clone(),
                    intent: draft.intent.clone(),
                })?;

            let mut action = Action::new(draft.executor, command).with_description(draft.intent);
            action.parameters = draft.parameters;
            actions.push(action);
        }

        let plan = Plan::new(incident.id, actions);
        validate_plan(&plan, incident.id)?;
        tracing::debug!(incident_id = %incident.id, plan_id = %plan.id(), actions = plan.len(), "resolved plan generated");
        Ok(plan)
    }
}
