//! Plan contract and plan generation
//!
//! The engine does not dictate how a plan is produced, only what it must
//! look like before enforcement (see [`validate_plan`]). Two generators ship:
//!
//! - [`RulePlanGenerator`]: keyword rules over the failure type, with action
//!   templates filled from the affected resource
//! - [`ResolvingPlanGenerator`]: an outline of intents, resolved into
//!   concrete commands by a [`CommandResolver`]

mod resolving;
mod rules;

pub use resolving::{ActionDraft, CommandResolver, IntentTable, OutlineSource, ResolvingPlanGenerator};
pub use rules::{ActionTemplate, PlanRule, RulePlanGenerator};

use async_trait::async_trait;
use remedy_model::{ActionId, Incident, IncidentId, Plan};
use std::collections::HashSet;

/// Plan is not fit for enforcement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    /// No actions
    #[error("plan has no actions")]
    Empty,

    /// Action without an executor type
    #[error("action '{action_id}' has no executor type")]
    BlankExecutor {
        /// Offending action
        action_id: ActionId,
    },

    /// Action without a command
    #[error("action '{action_id}' has no command")]
    BlankCommand {
        /// Offending action
        action_id: ActionId,
    },

    /// Two actions share an id
    #[error("duplicate action id '{0}'")]
    DuplicateActionId(ActionId),

    /// Plan was generated for another incident
    #[error("plan targets incident {plan_incident}, not {incident}")]
    IncidentMismatch {
        /// Incident the plan is bound to
        plan_incident: IncidentId,
        /// Incident being enforced
        incident: IncidentId,
    },
}

/// Check a plan against the enforcement contract
///
/// # Errors
/// The first [`PlanValidationError`] found, in action order.
pub fn validate_plan(plan: &Plan, incident_id: IncidentId) -> Result<(), PlanValidationError> {
    if plan.incident_id() != incident_id {
        return Err(PlanValidationError::IncidentMismatch {
            plan_incident: plan.incident_id(),
            incident: incident_id,
        });
    }
    if plan.is_empty() {
        return Err(PlanValidationError::Empty);
    }

    let mut seen = HashSet::with_capacity(plan.len());
    for action in plan.actions() {
        if action.executor.trim().is_empty() {
            return Err(PlanValidationError::BlankExecutor {
                action_id: action.action_id.clone(),
            });
        }
        if action.command.trim().is_empty() {
            return Err(PlanValidationError::BlankCommand {
                action_id: action.action_id.clone(),
            });
        }
        if !seen.insert(&action.action_id) {
            return Err(PlanValidationError::DuplicateActionId(action.action_id.clone()));
        }
    }
    Ok(())
}

/// Plan could not be generated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanGenerationError {
    /// No rule covers the failure type
    #[error("no remediation rule matches failure type '{failure_type}'")]
    NoMatchingRule {
        /// Failure type that went unmatched
        failure_type: String,
    },

    /// A drafted action is still missing its command after resolution
    #[error("could not resolve a {executor} command for '{intent}'")]
    Unresolved {
        /// Target executor type
        executor: String,
        /// Intent that stayed unresolved
        intent: String,
    },

    /// Outline phase failed
    #[error("outline generation failed: {0}")]
    Outline(String),

    /// Resolution phase failed
    #[error("command resolution failed: {0}")]
    Resolver(String),

    /// Generated plan breaks the plan contract
    #[error("generated plan is invalid: {0}")]
    Invalid(#[from] PlanValidationError),
}

/// Produces a plan for an incident
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Generate a plan bound to `incident`
    async fn generate(&self, incident: &Incident) -> Result<Plan, PlanGenerationError>;
}

/// Lower-case substring match of any keyword
pub(crate) fn keyword_match(keywords: &[String], failure_type: &str) -> bool {
    let lowered = failure_type.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_model::{Action, AffectedResource, Severity};

    fn incident() -> Incident {
        Incident::new(AffectedResource::new("Pod", "web", "prod"), "CrashLoopBackOff", "", Severity::Critical)
    }

    #[test]
    fn valid_plan_passes() {
        let incident = incident();
        let plan = Plan::new(
            incident.id,
            vec![Action::new("cluster", "delete pod"), Action::new("gitops", "sync web")],
        );
        assert_eq!(validate_plan(&plan, incident.id), Ok(()));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let incident = incident();
        let plan = Plan::new(incident.id, Vec::new());
        assert_eq!(validate_plan(&plan, incident.id), Err(PlanValidationError::Empty));
    }

    #[test]
    fn blank_fields_are_rejected() {
        let incident = incident();
        let plan = Plan::new(incident.id, vec![Action::new(" ", "delete pod").with_id("a")]);
        assert!(matches!(
            validate_plan(&plan, incident.id),
            Err(PlanValidationError::BlankExecutor { .. })
        ));

        let plan = Plan::new(incident.id, vec![Action::new("cluster", "").with_id("a")]);
        assert_eq!(
            validate_plan(&plan, incident.id),
            Err(PlanValidationError::BlankCommand { action_id: "a".into() })
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let incident = incident();
        let plan = Plan::new(
            incident.id,
            vec![
                Action::new("cluster", "delete pod").with_id("step"),
                Action::new("cluster", "read logs").with_id("step"),
            ],
        );
        assert_eq!(
            validate_plan(&plan, incident.id),
            Err(PlanValidationError::DuplicateActionId("step".into()))
        );
    }

    #[test]
    fn foreign_plan_is_rejected() {
        let plan = Plan::new(IncidentId::new(), vec![Action::new("cluster", "delete pod")]);
        assert!(matches!(
            validate_plan(&plan, incident().id),
            Err(PlanValidationError::IncidentMismatch { .. })
        ));
    }

    #[test]
    fn keyword_matching() {
        let keywords = vec!["ImagePull".to_string()];
        assert!(keyword_match(&keywords, "ErrImagePull"));
        assert!(!keyword_match(&keywords, "CrashLoopBackOff"));
        assert!(!keyword_match(&[String::new()], "anything"));
    }
}
