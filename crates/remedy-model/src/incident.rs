//! Incidents and their lifecycle
//!
//! An [`Incident`] is created by the normalizer in [`IncidentStatus::Open`]
//! and afterwards only the enforcer moves its status, always through
//! [`Incident::transition_to`].

use crate::event::RawEvent;
use crate::ids::IncidentId;
use crate::state_machine::{self, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace assumed when an event does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of the entity an incident is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffectedResource {
    /// Resource kind (`Pod`, `Deployment`, ...)
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Namespace the resource lives in
    pub namespace: String,
}

impl AffectedResource {
    /// Create new resource identity
    #[inline]
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Identity used when nothing could be extracted
    #[must_use]
    pub fn unknown() -> Self {
        Self::new("Unknown", "Unknown", DEFAULT_NAMESPACE)
    }
}

impl fmt::Display for AffectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational or self-healing
    Low,
    /// Degraded but serving
    Medium,
    /// Failing operations
    High,
    /// Workload down or flapping
    Critical,
}

impl Severity {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status, see [`crate::state_machine`] for legal moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Created, nothing attempted yet
    #[default]
    Open,
    /// An enforcement run is in progress
    Remediating,
    /// Every action of the run succeeded
    Resolved,
    /// Some, but not all, of several independent plans succeeded
    PartiallyRemediated,
    /// The run aborted before completing its plan
    FailedRemediation,
}

impl IncidentStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Remediating => "remediating",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::PartiallyRemediated => "partially_remediated",
            IncidentStatus::FailedRemediation => "failed_remediation",
        }
    }

    /// Whether this status ends an enforcement pass
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IncidentStatus::Resolved
                | IncidentStatus::PartiallyRemediated
                | IncidentStatus::FailedRemediation
        )
    }

    /// Aggregate the final statuses of several independent plan runs
    ///
    /// All resolved gives `Resolved`, none resolved gives `FailedRemediation`,
    /// anything in between is `PartiallyRemediated`. An empty input has
    /// nothing to aggregate and yields `Open`.
    #[must_use]
    pub fn rollup<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = IncidentStatus>,
    {
        let (mut total, mut resolved) = (0usize, 0usize);
        for status in outcomes {
            total += 1;
            if status == IncidentStatus::Resolved {
                resolved += 1;
            }
        }
        match (total, resolved) {
            (0, _) => IncidentStatus::Open,
            (t, r) if t == r => IncidentStatus::Resolved,
            (_, 0) => IncidentStatus::FailedRemediation,
            _ => IncidentStatus::PartiallyRemediated,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of one detected problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique id
    pub id: IncidentId,
    /// Entity the incident concerns
    pub affected_resource: AffectedResource,
    /// Short classification, usually a reason code
    pub failure_type: String,
    /// Best-effort human description
    pub description: String,
    /// Derived severity
    pub severity: Severity,
    status: IncidentStatus,
    raw_events: Vec<RawEvent>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change or appended event
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Create new open incident
    #[must_use]
    pub fn new(
        affected_resource: AffectedResource,
        failure_type: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: IncidentId::new(),
            affected_resource,
            failure_type: failure_type.into(),
            description: description.into(),
            severity,
            status: IncidentStatus::Open,
            raw_events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the event that justified this incident
    #[inline]
    #[must_use]
    pub fn with_event(mut self, event: RawEvent) -> Self {
        self.raw_events.push(event);
        self
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> IncidentStatus {
        self.status
    }

    /// Events owned by this incident, oldest first
    #[inline]
    #[must_use]
    pub fn raw_events(&self) -> &[RawEvent] {
        &self.raw_events
    }

    /// Append a further event (append-only)
    pub fn push_event(&mut self, event: RawEvent) {
        self.raw_events.push(event);
        self.updated_at = Utc::now();
    }

    /// Move to `to` if the lifecycle allows it
    ///
    /// Returns the previous status.
    ///
    /// # Errors
    /// [`TransitionError`] when the move is not an arrow of the lifecycle.
    pub fn transition_to(&mut self, to: IncidentStatus) -> Result<IncidentStatus, TransitionError> {
        state_machine::validate_transition(self.status, to)?;
        let from = self.status;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(from)
    }
}
