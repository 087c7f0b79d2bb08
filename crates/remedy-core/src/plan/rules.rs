//! Rule-table plan generator

use super::{keyword_match, validate_plan, PlanGenerationError, PlanGenerator};
use async_trait::async_trait;
use remedy_model::{Action, AffectedResource, Incident, Parameters, Plan};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action with `{name}`, `{namespace}` and `{kind}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    /// Executor type
    pub executor: String,
    /// Command template
    pub command: String,
    /// Parameter templates; only string values are substituted
    #[serde(default)]
    pub parameters: Parameters,
    /// Description template
    #[serde(default)]
    pub description: String,
}

impl ActionTemplate {
    /// Cluster action addressed at the affected resource
    #[must_use]
    pub fn cluster(command: &str, description: &str) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert("name".to_string(), Value::String("{name}".to_string()));
        parameters.insert("namespace".to_string(), Value::String("{namespace}".to_string()));
        Self {
            executor: "cluster".to_string(),
            command: command.to_string(),
            parameters,
            description: description.to_string(),
        }
    }

    fn render(&self, resource: &AffectedResource) -> Action {
        let parameters = self
            .parameters
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => Value::String(fill(s, resource)),
                    other => other.clone(),
                };
                (k.clone(), v)
            })
            .collect();

        let mut action = Action::new(self.executor.clone(), fill(&self.command, resource))
            .with_description(fill(&self.description, resource));
        action.parameters = parameters;
        action
    }
}

fn fill(template: &str, resource: &AffectedResource) -> String {
    template
        .replace("{name}", &resource.name)
        .replace("{namespace}", &resource.namespace)
        .replace("{kind}", &resource.kind)
}

/// Failure-type keywords mapped to a list of action templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRule {
    /// Substrings of the failure type (case-insensitive)
    pub keywords: Vec<String>,
    /// Actions to plan, in order
    pub actions: Vec<ActionTemplate>,
}

/// Generates plans from an ordered rule table, first match wins
#[derive(Debug, Clone, PartialEq)]
pub struct RulePlanGenerator {
    rules: Vec<PlanRule>,
}

impl RulePlanGenerator {
    /// Create generator from rules in priority order
    #[must_use]
    pub fn new(rules: Vec<PlanRule>) -> Self {
        Self { rules }
    }

    /// Rules in priority order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[PlanRule] {
        &self.rules
    }

    /// Build the plan for an incident without going through the trait
    ///
    /// # Errors
    /// `NoMatchingRule` when no rule covers the failure type; `Invalid` when
    /// the matched templates render into an invalid plan.
    pub fn plan_for(&self, incident: &Incident) -> Result<Plan, PlanGenerationError> {
        let rule = self
            .rules
            .iter()
            .find(|rule| keyword_match(&rule.keywords, &incident.failure_type))
            .ok_or_else(|| PlanGenerationError::NoMatchingRule {
                failure_type: incident.failure_type.clone(),
            })?;

        let actions = rule
            .actions
            .iter()
            .map(|template| template.render(&incident.affected_resource))
            .collect();
        let plan = Plan::new(incident.id, actions);
        validate_plan(&plan, incident.id)?;

        tracing::debug!(incident_id = %incident.id, plan_id = %plan.id(), actions = plan.len(), "rule plan generated");
        Ok(plan)
    }
}

impl Default for RulePlanGenerator {
    fn default() -> Self {
        Self::new(vec![
            PlanRule {
                keywords: vec!["crashloop".to_string()],
                actions: vec![ActionTemplate::cluster(
                    "delete pod",
                    "delete crash-looping pod {namespace}/{name} so its controller recreates it",
                )],
            },
            PlanRule {
                keywords: vec!["imagepull".to_string(), "errimage".to_string()],
                actions: vec![ActionTemplate::cluster(
                    "read logs",
                    "collect logs of {namespace}/{name} for the image pull failure",
                )],
            },
            PlanRule {
                keywords: vec!["unhealthy".to_string(), "probe".to_string()],
                actions: vec![ActionTemplate::cluster(
                    "rollout restart deployment",
                    "rolling restart of {namespace}/{name}",
                )],
            },
        ])
    }
}

#[async_trait]
impl PlanGenerator for RulePlanGenerator {
    async fn generate(&self, incident: &Incident) -> Result<Plan, PlanGenerationError> {
        self.plan_for(incident)
    }
}
