//! Execution outcomes and attempt records

use crate::ids::{ActionId, ExecutionId, PlanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The action took effect
    Success,
    /// The action failed
    Failure,
    /// Accepted but not actionable yet; never counts as success
    Pending,
}

impl ExecutionStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::Pending => "pending",
        }
    }

    /// Only `Success` is success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An executor's verdict for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Attempt status
    pub status: ExecutionStatus,
    /// Backend output, if any
    pub output: Option<String>,
    /// Error description, if any
    pub error: Option<String>,
}

impl ActionOutcome {
    /// Successful attempt
    #[inline]
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Failed attempt
    #[inline]
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failure,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Accepted, not yet actionable
    #[inline]
    #[must_use]
    pub fn pending(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Pending,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Attach backend output to a failure
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Whether the attempt succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Record of one attempt of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Unique id of this attempt
    pub execution_id: ExecutionId,
    /// Plan being enforced
    pub plan_id: PlanId,
    /// Action attempted
    pub action_id: ActionId,
    /// 1-based attempt number for this action
    pub attempt: u32,
    /// Attempt status
    pub status: ExecutionStatus,
    /// Backend output
    pub output: Option<String>,
    /// Error description
    pub error: Option<String>,
    /// When the attempt finished
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Stamp an outcome with its plan, action and attempt number
    #[must_use]
    pub fn record(plan_id: PlanId, action_id: ActionId, attempt: u32, outcome: ActionOutcome) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            plan_id,
            action_id,
            attempt,
            status: outcome.status,
            output: outcome.output,
            error: outcome.error,
            executed_at: Utc::now(),
        }
    }

    /// Whether the attempt succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
