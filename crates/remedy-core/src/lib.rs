//! Remedy Core
//!
//! The remediation pipeline:
//! - [`Normalizer`] turns a raw monitoring payload into an [`Incident`]
//! - a [`PlanGenerator`] proposes a [`Plan`] for it
//! - the [`Enforcer`] executes the plan with bounded retries and fail-fast
//!   abort, driving the incident's status
//! - a [`RemediationSink`] receives every result and transition
//!
//! [`Remediator`] wires the stages together for a host process.
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_core::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), RemedyError> {
//! let remediator = Remediator::builder()
//!     .bundle(ExecutorConfigBundle::new().with("cluster", json!({ "api_url": "https://k8s:6443" })))
//!     .build();
//!
//! let event = RawEvent::new(json!({
//!     "kind": "Pod",
//!     "name": "prod/bad-pod",
//!     "reason": "CrashLoopBackOff",
//!     "message": "boom",
//! }));
//! let report = remediator.handle_event(event).await?;
//! println!("{} -> {}", report.incident.id, report.incident.status());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod enforcer;
pub mod error;
pub mod normalizer;
pub mod plan;
pub mod remediator;
pub mod severity;
pub mod sink;

pub use config::{ConfigError, EnforcerSettings, RemedyConfig};
pub use enforcer::{EnforceError, Enforcer, EnforcerConfig};
pub use error::RemedyError;
pub use normalizer::{NormalizationError, Normalizer};
pub use plan::{
    validate_plan, ActionDraft, ActionTemplate, CommandResolver, IntentTable, OutlineSource,
    PlanGenerationError, PlanGenerator, PlanRule, PlanValidationError, ResolvingPlanGenerator,
    RulePlanGenerator,
};
pub use remediator::{RemediationReport, Remediator, RemediatorBuilder};
pub use severity::{SeverityRule, SeverityRules};
pub use sink::{MemorySink, NoopSink, RemediationSink, SinkError, SinkRecord};

pub use remedy_executor::{ExecutorConfigBundle, ExecutorRegistry};
pub use remedy_model::{Action, ExecutionResult, Incident, IncidentStatus, Plan, RawEvent};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Remedy Core
    pub use crate::{
        Action, Enforcer, EnforcerConfig, ExecutionResult, ExecutorConfigBundle, ExecutorRegistry,
        Incident, IncidentStatus, Normalizer, Plan, PlanGenerator, RawEvent, RemedyConfig,
        RemedyError, RemediationReport, RemediationSink, Remediator, RulePlanGenerator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
