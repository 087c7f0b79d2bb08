//! Incident lifecycle transitions
//!
//! ```text
//! open ──► remediating ──► resolved
//!              │  ▲
//!              │  └──────── failed_remediation / partially_remediated (new pass)
//!              ├──► partially_remediated
//!              └──► failed_remediation
//! ```
//!
//! `resolved` is final. The two other terminal states end one enforcement
//! pass; a later pass for the same incident may move it back to
//! `remediating`.

use crate::incident::IncidentStatus;

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal incident transition: {from} -> {to}")]
pub struct TransitionError {
    /// Status the incident was in
    pub from: IncidentStatus,
    /// Status that was requested
    pub to: IncidentStatus,
}

/// Validates a status transition.
///
/// # Errors
/// [`TransitionError`] when `to` is not reachable from `from` in one step.
pub fn validate_transition(from: IncidentStatus, to: IncidentStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Every status reachable from `from` in one step.
#[must_use]
pub fn allowed_transitions(from: IncidentStatus) -> &'static [IncidentStatus] {
    use IncidentStatus::*;
    match from {
        Open => &[Remediating],
        Remediating => &[Resolved, PartiallyRemediated, FailedRemediation],
        PartiallyRemediated | FailedRemediation => &[Remediating],
        Resolved => &[],
    }
}
