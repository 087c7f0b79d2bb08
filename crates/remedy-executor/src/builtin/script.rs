//! Sandboxed-script executor
//!
//! The action's command is a script path followed by arguments. The script
//! must resolve (after symlinks and `..`) to a file under `allowed_dir`. It
//! runs with `allowed_dir` as working directory, a cleared environment
//! unless `inherit_env` is set, and a hard wall-clock timeout after which the
//! child is killed.

use crate::config::{parse_settings, require};
use crate::error::{ExecutorError, ResolutionError};
use crate::executor::Executor;
use remedy_model::{Action, ActionOutcome, ExecutionStatus};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[derive(Debug, Deserialize)]
struct ScriptSettings {
    allowed_dir: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
    #[serde(default)]
    inherit_env: bool,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

fn default_timeout() -> u64 {
    60
}

/// Local script executor confined to one directory
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    allowed_dir: PathBuf,
    timeout: Duration,
    inherit_env: bool,
    env: BTreeMap<String, String>,
}

impl ScriptExecutor {
    /// Registry type identifier
    pub const TYPE: &'static str = "script";

    /// Build from the `script` section of the configuration bundle
    ///
    /// # Errors
    /// - `MissingConfig` without `allowed_dir`
    /// - `InvalidConfig` when `allowed_dir` does not exist
    pub fn from_settings(settings: &Value) -> Result<Self, ResolutionError> {
        let settings: ScriptSettings = parse_settings(Self::TYPE, settings)?;
        let dir = require(Self::TYPE, "allowed_dir", settings.allowed_dir)?;
        let allowed_dir = std::fs::canonicalize(&dir).map_err(|e| {
            ResolutionError::invalid(Self::TYPE, format!("allowed_dir {}: {e}", dir.display()))
        })?;
        if !allowed_dir.is_dir() {
            return Err(ResolutionError::invalid(
                Self::TYPE,
                format!("allowed_dir {} is not a directory", allowed_dir.display()),
            ));
        }

        Ok(Self {
            allowed_dir,
            timeout: Duration::from_secs(settings.timeout_secs),
            inherit_env: settings.inherit_env,
            env: settings.env,
        })
    }

    /// Canonical directory scripts are confined to
    #[inline]
    #[must_use]
    pub fn allowed_dir(&self) -> &Path {
        &self.allowed_dir
    }

    /// Resolve the script path and check confinement
    async fn locate(&self, script: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(script);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.allowed_dir.join(candidate)
        };

        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|e| format!("script not found: {} ({e})", candidate.display()))?;
        if !resolved.starts_with(&self.allowed_dir) {
            return Err(format!(
                "script {} is outside allowed directory {}",
                resolved.display(),
                self.allowed_dir.display()
            ));
        }
        if !resolved.is_file() {
            return Err(format!("script {} is not a file", resolved.display()));
        }
        Ok(resolved)
    }

    fn command(&self, script: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(script);
        cmd.args(args)
            .current_dir(&self.allowed_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.inherit_env {
            cmd.env_clear().env("PATH", DEFAULT_PATH);
        }
        cmd.envs(&self.env);
        cmd
    }
}

#[async_trait::async_trait]
impl Executor for ScriptExecutor {
    fn executor_type(&self) -> &str {
        Self::TYPE
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ExecutorError> {
        let mut words = action.command.split_whitespace();
        let Some(script) = words.next() else {
            return Ok(ActionOutcome::failure("empty script command"));
        };
        let mut args: Vec<String> = words.map(str::to_string).collect();
        args.extend(extra_args(action.parameters.get("args")));

        let path = match self.locate(script).await {
            Ok(path) => path,
            Err(reason) => {
                tracing::warn!(action_id = %action.action_id, %reason, "script rejected");
                return Ok(ActionOutcome::failure(reason));
            }
        };

        let child = match self.command(&path, &args).spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(ActionOutcome::failure(format!(
                    "failed to start {}: {e}",
                    path.display()
                )))
            }
        };

        tracing::debug!(action_id = %action.action_id, script = %path.display(), ?args, "running script");
        // dropping the wait future on timeout kills the child (kill_on_drop)
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(ActionOutcome::failure(format!(
                    "failed waiting for {}: {e}",
                    path.display()
                )))
            }
            Err(_) => {
                return Ok(ActionOutcome::failure(format!(
                    "script {} timed out after {}s",
                    path.display(),
                    self.timeout.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let outcome = if output.status.success() {
            ActionOutcome {
                status: ExecutionStatus::Success,
                output: Some(stdout),
                error: (!stderr.is_empty()).then_some(stderr),
            }
        } else {
            let exit = match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            let error = if stderr.is_empty() {
                exit
            } else {
                format!("{exit}: {stderr}")
            };
            ActionOutcome {
                status: ExecutionStatus::Failure,
                output: Some(stdout),
                error: Some(error),
            }
        };
        Ok(outcome)
    }
}

/// Extra arguments from an `args` parameter (list or single string)
fn extra_args(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
