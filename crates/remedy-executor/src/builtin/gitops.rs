//! GitOps-sync executor
//!
//! Drives an Argo CD style application API with a bearer token.
//!
//! - `sync`: `POST /api/v1/applications/{app}/sync`
//! - `status` / `get` / `health`: `GET /api/v1/applications/{app}`; success
//!   only once the application is `Synced` and `Healthy`, otherwise pending
//! - `rollback`: accepted but not automated yet, always pending
//!
//! Application names must be valid Kubernetes object names.

use super::http::{build_client, check_name, endpoint, parse_base_url, read_body, transport_error, NameRule};
use crate::command::command_tokens;
use crate::config::{parse_settings, require};
use crate::error::{ExecutorError, ResolutionError};
use crate::executor::Executor;
use remedy_model::{Action, ActionOutcome};
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct GitOpsSettings {
    base_url: Option<String>,
    token: Option<String>,
    #[serde(default = "super::default_true")]
    verify_tls: bool,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GitOpsCommand {
    Sync,
    Status,
    Rollback,
}

impl GitOpsCommand {
    fn parse(command: &str) -> Option<Self> {
        command_tokens(command).iter().find_map(|t| match t.as_str() {
            "sync" => Some(Self::Sync),
            "status" | "get" | "health" | "refresh" => Some(Self::Status),
            "rollback" => Some(Self::Rollback),
            _ => None,
        })
    }
}

/// Application sync/health as reported by the API
#[derive(Debug, Default, Deserialize)]
struct Application {
    #[serde(default)]
    status: AppStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppStatus {
    #[serde(default)]
    sync: StatusField,
    #[serde(default)]
    health: StatusField,
    operation_state: Option<OperationState>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusField {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationState {
    phase: Option<String>,
}

/// Argo CD style API executor
#[derive(Debug, Clone)]
pub struct GitOpsExecutor {
    client: Client,
    base_url: Url,
    token: String,
}

impl GitOpsExecutor {
    /// Registry type identifier
    pub const TYPE: &'static str = "gitops";

    /// Build from the `gitops` section of the configuration bundle
    ///
    /// # Errors
    /// `ResolutionError::MissingConfig` without `base_url` or `token`.
    pub fn from_settings(settings: &Value) -> Result<Self, ResolutionError> {
        let settings: GitOpsSettings = parse_settings(Self::TYPE, settings)?;
        let base_url = require(Self::TYPE, "base_url", settings.base_url)?;
        let base_url = parse_base_url(Self::TYPE, &base_url)?;
        let token = require(Self::TYPE, "token", settings.token)?;
        let client = build_client(Self::TYPE, settings.verify_tls, settings.timeout_secs)?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn application_url(&self, app: &str, suffix: Option<&str>) -> Result<Url, String> {
        endpoint(&self.base_url, ["api", "v1", "applications", app].into_iter().chain(suffix))
    }

    async fn send(&self, url: &Url, builder: RequestBuilder) -> Result<String, String> {
        let url = url.as_str();
        let response = builder
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        let (status, body) = read_body(url, response).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(api_error(status.as_u16(), &body))
        }
    }

    async fn sync(&self, app: &str, action: &Action) -> ActionOutcome {
        let url = match self.application_url(app, Some("sync")) {
            Ok(url) => url,
            Err(e) => return ActionOutcome::failure(e),
        };
        let mut body = json!({
            "prune": action.parameters.get("prune").and_then(Value::as_bool).unwrap_or(false),
            "dryRun": false,
        });
        if let Some(revision) = action.param_str("revision") {
            body["revision"] = Value::String(revision.to_string());
        }

        match self.send(&url, self.client.post(url.clone()).json(&body)).await {
            Ok(raw) => {
                let phase = serde_json::from_str::<Application>(&raw)
                    .ok()
                    .and_then(|a| a.status.operation_state)
                    .and_then(|o| o.phase);
                match phase {
                    Some(phase) => ActionOutcome::success(format!("sync of {app} started ({phase})")),
                    None => ActionOutcome::success(format!("sync of {app} started")),
                }
            }
            Err(e) => ActionOutcome::failure(e),
        }
    }

    async fn status(&self, app: &str) -> ActionOutcome {
        let url = match self.application_url(app, None) {
            Ok(url) => url,
            Err(e) => return ActionOutcome::failure(e),
        };
        let raw = match self.send(&url, self.client.get(url.clone())).await {
            Ok(raw) => raw,
            Err(e) => return ActionOutcome::failure(e),
        };
        let app_state: Application = match serde_json::from_str(&raw) {
            Ok(a) => a,
            Err(e) => return ActionOutcome::failure(format!("unreadable application status: {e}")),
        };

        let sync = app_state.status.sync.status.unwrap_or_else(|| "Unknown".to_string());
        let health = app_state.status.health.status.unwrap_or_else(|| "Unknown".to_string());
        let summary = format!("{app}: sync={sync} health={health}");
        if sync == "Synced" && health == "Healthy" {
            ActionOutcome::success(summary)
        } else {
            ActionOutcome::pending(summary)
        }
    }
}

#[async_trait::async_trait]
impl Executor for GitOpsExecutor {
    fn executor_type(&self) -> &str {
        Self::TYPE
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ExecutorError> {
        let Some(command) = GitOpsCommand::parse(&action.command) else {
            return Ok(ActionOutcome::failure(format!(
                "unsupported gitops command: '{}'",
                action.command
            )));
        };
        let Some(app) = application_name(action) else {
            return Ok(ActionOutcome::failure("missing required parameter: application"));
        };
        if let Err(reason) = check_name("application", &app, NameRule::Subdomain) {
            return Ok(ActionOutcome::failure(reason));
        }

        tracing::debug!(action_id = %action.action_id, ?command, %app, "gitops command");
        let outcome = match command {
            GitOpsCommand::Sync => self.sync(&app, action).await,
            GitOpsCommand::Status => self.status(&app).await,
            GitOpsCommand::Rollback => {
                ActionOutcome::pending(format!("rollback of {app} accepted; not automated yet"))
            }
        };
        Ok(outcome)
    }
}

/// Application from parameters, else the word after the verb (`sync web`)
fn application_name(action: &Action) -> Option<String> {
    ["application", "app", "name"]
        .iter()
        .find_map(|key| action.param_str(key))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| action.command.split_whitespace().nth(1).map(str::to_string))
}

/// Argo CD error body
#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    error: Option<String>,
}

fn api_error(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("{status}: empty response")
    } else {
        format!("{status}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing() {
        assert_eq!(GitOpsCommand::parse("Sync"), Some(GitOpsCommand::Sync));
        assert_eq!(GitOpsCommand::parse("get-status"), Some(GitOpsCommand::Status));
        assert_eq!(GitOpsCommand::parse("rollback"), Some(GitOpsCommand::Rollback));
        assert_eq!(GitOpsCommand::parse("terminate"), None);
    }

    #[test]
    fn application_from_params_or_command() {
        let action = Action::new("gitops", "sync").with_param("app", "web");
        assert_eq!(application_name(&action).as_deref(), Some("web"));

        let action = Action::new("gitops", "sync checkout");
        assert_eq!(application_name(&action).as_deref(), Some("checkout"));

        assert_eq!(application_name(&Action::new("gitops", "sync")), None);
    }

    #[test]
    fn token_is_required() {
        let err = GitOpsExecutor::from_settings(&json!({"base_url": "https://argo"})).unwrap_err();
        assert_eq!(err, ResolutionError::missing("gitops", "token"));
    }

    #[test]
    fn api_error_prefers_message() {
        assert_eq!(
            api_error(403, r#"{"error":"permission denied","code":7,"message":"permission denied: applications, sync"}"#),
            "403: permission denied: applications, sync"
        );
        assert_eq!(api_error(500, ""), "500: empty response");
    }
}
