use crate::error::ExecutorError;
use remedy_model::{Action, ActionOutcome};
use std::fmt::Debug;

/// Executor trait
///
/// Implement this trait to add a remediation backend, then register a
/// constructor for it with [`crate::ExecutorRegistry::register`].
///
/// Expected failure modes (bad parameters, remote 4xx/5xx, timeouts,
/// missing files) must be reported as [`ActionOutcome::failure`], never as
/// `Err`. `Err` is reserved for conditions the executor cannot classify.
#[async_trait::async_trait]
pub trait Executor: Send + Sync + Debug {
    /// Type identifier this executor serves
    fn executor_type(&self) -> &str;

    /// Perform one attempt of `action`
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ExecutorError>;
}
