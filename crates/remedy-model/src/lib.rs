//! Remedy Model
//!
//! Data model shared by every stage of the remediation pipeline.
//!
//! # Core Concepts
//!
//! - [`RawEvent`]: opaque inbound payload, consumed once by the normalizer
//! - [`Incident`]: one detected problem and its lifecycle [`IncidentStatus`]
//! - [`Plan`]: ordered [`Action`]s bound to exactly one incident
//! - [`ActionOutcome`]: an executor's verdict for one attempt
//! - [`ExecutionResult`]: the durable record of one attempt
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_model::{Action, AffectedResource, Incident, Plan, Severity};
//!
//! let incident = Incident::new(
//!     AffectedResource::new("Pod", "bad-pod", "prod"),
//!     "CrashLoopBackOff",
//!     "container exited",
//!     Severity::Critical,
//! );
//! let plan = Plan::new(incident.id, vec![Action::new("cluster", "delete pod")]);
//! ```

#![warn(unreachable_pub)]

mod event;
mod execution;
mod ids;
mod incident;
mod plan;
pub mod state_machine;

pub use event::RawEvent;
pub use execution::{ActionOutcome, ExecutionResult, ExecutionStatus};
pub use ids::{ActionId, ExecutionId, IncidentId, PlanId};
pub use incident::{AffectedResource, Incident, IncidentStatus, Severity, DEFAULT_NAMESPACE};
pub use plan::{Action, Parameters, Plan};
pub use state_machine::TransitionError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
