//! Error types for executor resolution and execution
//!
//! The two enums mirror the two result kinds of the engine:
//! - [`ResolutionError`]: configuration-class, raised when an executor cannot
//!   be built. Never retried.
//! - [`ExecutorError`]: an executor hit a condition it does not know how to
//!   report as an outcome. Never retried.
//!
//! Expected backend failures are neither; they come back as
//! `ActionOutcome::failure`.

/// Executor could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No constructor registered under this type identifier
    #[error("unknown executor type: {0}")]
    UnknownType(String),

    /// Required setting absent from the configuration bundle
    #[error("missing required configuration for executor '{executor}': {field}")]
    MissingConfig {
        /// Executor type
        executor: String,
        /// Setting name
        field: String,
    },

    /// Setting present but unusable
    #[error("invalid configuration for executor '{executor}': {reason}")]
    InvalidConfig {
        /// Executor type
        executor: String,
        /// What is wrong
        reason: String,
    },

    /// Backend client construction failed
    #[error("failed to construct executor '{executor}': {reason}")]
    Construction {
        /// Executor type
        executor: String,
        /// Underlying failure
        reason: String,
    },
}

impl ResolutionError {
    /// Missing setting
    #[inline]
    pub fn missing(executor: &str, field: &str) -> Self {
        Self::MissingConfig {
            executor: executor.to_string(),
            field: field.to_string(),
        }
    }

    /// Invalid setting
    #[inline]
    pub fn invalid(executor: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            executor: executor.to_string(),
            reason: reason.into(),
        }
    }
}

/// Unexpected executor failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Condition outside the executor's expected failure modes
    #[error("unexpected executor failure: {0}")]
    Unexpected(String),

    /// The executor panicked while handling the action
    #[error("executor panicked: {0}")]
    Panicked(String),
}
