//! Plans and actions

use crate::ids::{ActionId, IncidentId, PlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Action parameters, ordered for stable serialization
pub type Parameters = BTreeMap<String, Value>;

/// One remediation step bound to one executor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique within the plan
    #[serde(default)]
    pub action_id: ActionId,
    /// Executor type identifier (`cluster`, `gitops`, `script`, ...)
    pub executor: String,
    /// Resolved, executable command
    pub command: String,
    /// Executor-specific parameters
    #[serde(default)]
    pub parameters: Parameters,
    /// Human-readable purpose of the step
    #[serde(default)]
    pub description: String,
}

impl Action {
    /// Create new action with a generated id
    #[must_use]
    pub fn new(executor: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            action_id: ActionId::generate(),
            executor: executor.into(),
            command: command.into(),
            parameters: Parameters::new(),
            description: String::new(),
        }
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ActionId>) -> Self {
        self.action_id = id.into();
        self
    }

    /// With one parameter
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// String parameter, if present and a string
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Ordered actions for one incident
///
/// Immutable once created; execution state lives on the incident and on the
/// execution results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    id: PlanId,
    incident_id: IncidentId,
    actions: Vec<Action>,
    created_at: DateTime<Utc>,
}

impl Plan {
    /// Create new plan for an incident
    #[must_use]
    pub fn new(incident_id: IncidentId, actions: Vec<Action>) -> Self {
        Self {
            id: PlanId::new(),
            incident_id,
            actions,
            created_at: Utc::now(),
        }
    }

    /// Plan id
    #[inline]
    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    /// Incident this plan remediates
    #[inline]
    #[must_use]
    pub fn incident_id(&self) -> IncidentId {
        self.incident_id
    }

    /// Actions in execution order
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of actions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Copy of this plan's actions bound to another incident, with a fresh id
    #[must_use]
    pub fn rebind(&self, incident_id: IncidentId) -> Self {
        Self::new(incident_id, self.actions.clone())
    }
}
