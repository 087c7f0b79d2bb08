//! Cluster-command executor
//!
//! Talks to the Kubernetes REST API directly. Supported commands:
//!
//! | verb tokens                  | effect                               |
//! |------------------------------|--------------------------------------|
//! | `get`, `read`, `describe`    | GET the resource                     |
//! | `delete`, `remove`           | DELETE the resource                  |
//! | `logs`, `log`                | GET pod logs                         |
//! | `restart`, `rollout restart` | patch the pod template annotation    |
//!
//! The verb is the leading token, after an optional `kubectl` or `rollout`
//! prefix. A kind token (`pod`, `deployment`, ...) may follow the verb; the
//! `kind` parameter overrides it. `name` and `namespace` must be valid
//! Kubernetes names. A rolling restart never deletes the workload: it
//! stamps `kubectl.kubernetes.io/restartedAt` on the pod template and lets
//! the controller roll the pods.

use super::http::{build_client, check_name, endpoint, parse_base_url, read_body, transport_error, NameRule};
use super::kubeconfig::KubeEndpoint;
use crate::command::command_tokens;
use crate::config::parse_settings;
use crate::error::{ExecutorError, ResolutionError};
use crate::executor::Executor;
use remedy_model::{Action, ActionOutcome, DEFAULT_NAMESPACE};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;

const RESTARTED_AT: &str = "kubectl.kubernetes.io/restartedAt";
const STRATEGIC_MERGE_PATCH: &str = "application/strategic-merge-patch+json";

#[derive(Debug, Deserialize)]
struct ClusterSettings {
    api_url: Option<String>,
    token: Option<String>,
    kubeconfig: Option<PathBuf>,
    #[serde(default = "super::default_true")]
    verify_tls: bool,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Resource kinds the executor can address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// core/v1 Pod
    Pod,
    /// apps/v1 Deployment
    Deployment,
    /// apps/v1 StatefulSet
    StatefulSet,
    /// apps/v1 DaemonSet
    DaemonSet,
    /// apps/v1 ReplicaSet
    ReplicaSet,
    /// core/v1 Service
    Service,
    /// core/v1 ConfigMap
    ConfigMap,
}

impl ResourceKind {
    /// Parse a kind token, accepting plural and short forms
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let kind = match token.to_ascii_lowercase().as_str() {
            "pod" | "pods" | "po" => Self::Pod,
            "deployment" | "deployments" | "deploy" => Self::Deployment,
            "statefulset" | "statefulsets" | "sts" => Self::StatefulSet,
            "daemonset" | "daemonsets" | "ds" => Self::DaemonSet,
            "replicaset" | "replicasets" | "rs" => Self::ReplicaSet,
            "service" | "services" | "svc" => Self::Service,
            "configmap" | "configmaps" | "cm" => Self::ConfigMap,
            _ => return None,
        };
        Some(kind)
    }

    fn plural(self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Deployment => "deployments",
            Self::StatefulSet => "statefulsets",
            Self::DaemonSet => "daemonsets",
            Self::ReplicaSet => "replicasets",
            Self::Service => "services",
            Self::ConfigMap => "configmaps",
        }
    }

    fn api_prefix(self) -> &'static [&'static str] {
        match self {
            Self::Pod | Self::Service | Self::ConfigMap => &["api", "v1"],
            Self::Deployment | Self::StatefulSet | Self::DaemonSet | Self::ReplicaSet => &["apis", "apps", "v1"],
        }
    }

    fn has_pod_template(self) -> bool {
        matches!(self, Self::Deployment | Self::StatefulSet | Self::DaemonSet)
    }

    fn path_segments<'a>(self, namespace: &'a str, name: &'a str) -> Vec<&'a str> {
        let mut segments = self.api_prefix().to_vec();
        segments.extend(["namespaces", namespace, self.plural(), name]);
        segments
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = self.plural();
        f.write_str(&plural[..plural.len() - 1])
    }
}

/// Operation requested by a cluster command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterVerb {
    /// Fetch the resource
    Read,
    /// Delete the resource
    Delete,
    /// Fetch pod logs
    Logs,
    /// Rolling restart via pod template annotation
    Restart,
}

/// Parsed cluster command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCommand {
    /// What to do
    pub verb: ClusterVerb,
    /// What to do it to
    pub kind: ResourceKind,
}

impl ClusterCommand {
    /// Parse a free-form command, with an optional explicit kind
    ///
    /// # Errors
    /// A description of why the command is unsupported.
    pub fn parse(command: &str, kind_override: Option<&str>) -> Result<Self, String> {
        let tokens = command_tokens(command);
        let mut rest = tokens
            .iter()
            .map(String::as_str)
            .skip_while(|t| matches!(*t, "kubectl" | "rollout"))
            .peekable();
        let unsupported = || format!("unsupported cluster command: '{command}'");

        let verb = match rest.next().ok_or_else(unsupported)? {
            "logs" | "log" => ClusterVerb::Logs,
            "restart" => ClusterVerb::Restart,
            "delete" | "remove" => ClusterVerb::Delete,
            "get" | "read" | "describe" => {
                // `get logs`, `read logs`
                if rest.next_if(|t| matches!(*t, "logs" | "log")).is_some() {
                    ClusterVerb::Logs
                } else {
                    ClusterVerb::Read
                }
            }
            _ => return Err(unsupported()),
        };

        let kind = match kind_override {
            Some(raw) => ResourceKind::parse(raw).ok_or_else(|| format!("unsupported resource kind: '{raw}'"))?,
            None => rest
                .next()
                .and_then(ResourceKind::parse)
                .unwrap_or(match verb {
                    ClusterVerb::Restart => ResourceKind::Deployment,
                    _ => ResourceKind::Pod,
                }),
        };

        match (verb, kind) {
            (ClusterVerb::Logs, k) if k != ResourceKind::Pod => {
                Err(format!("logs are only available for pods, not {k}"))
            }
            (ClusterVerb::Restart, k) if !k.has_pod_template() => {
                Err(format!("rolling restart is not supported for {k}"))
            }
            _ => Ok(Self { verb, kind }),
        }
    }
}

/// Kubernetes API executor
#[derive(Debug, Clone)]
pub struct ClusterExecutor {
    client: Client,
    api_url: Url,
    token: Option<String>,
}

impl ClusterExecutor {
    /// Registry type identifier
    pub const TYPE: &'static str = "cluster";

    /// Build from the `cluster` section of the configuration bundle
    ///
    /// Either `api_url` (with optional `token`) or `kubeconfig` must be set.
    ///
    /// # Errors
    /// `ResolutionError` for missing endpoint settings, unreadable kubeconfig
    /// or HTTP client construction failure.
    pub fn from_settings(settings: &Value) -> Result<Self, ResolutionError> {
        let settings: ClusterSettings = parse_settings(Self::TYPE, settings)?;

        let (api_url, token, verify_tls) = match (settings.api_url, settings.kubeconfig) {
            (Some(url), _) => (url, settings.token, settings.verify_tls),
            (None, Some(path)) => {
                let endpoint = KubeEndpoint::load(&path)?;
                let verify = settings.verify_tls && !endpoint.insecure_skip_tls_verify;
                (endpoint.server, settings.token.or(endpoint.token), verify)
            }
            (None, None) => return Err(ResolutionError::missing(Self::TYPE, "api_url")),
        };

        let api_url = parse_base_url(Self::TYPE, &api_url)?;
        let client = build_client(Self::TYPE, verify_tls, settings.timeout_secs)?;
        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, url: &Url, builder: RequestBuilder) -> Result<String, String> {
        let url = url.as_str();
        let response = self
            .request(builder)
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

    async fn run(&self, command: ClusterCommand, action: &Action) -> Result<String, String> {
        let name = action
            .param_str("name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "missing required parameter: name".to_string())?;
        let namespace = action
            .param_str("namespace")
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE);
        check_name("name", name, NameRule::Subdomain)?;
        check_name("namespace", namespace, NameRule::Label)?;
        let target = format!("{} {namespace}/{name}", command.kind);
        let url = endpoint(&self.api_url, command.kind.path_segments(namespace, name))?;

        match command.verb {
            ClusterVerb::Read => self.send(&url, self.client.get(url.clone())).await,
            ClusterVerb::Delete => {
                self.send(&url, self.client.delete(url.clone())).await?;
                Ok(format!("deleted {target}"))
            }
            ClusterVerb::Logs => {
                let url = endpoint(&url, ["log"])?;
                let mut query: Vec<(&str, String)> = Vec::new();
                if let Some(container) = action.param_str("container") {
                    query.push(("container", container.to_string()));
                }
                if let Some(tail) = action.parameters.get("tail_lines").and_then(tail_lines) {
                    query.push(("tailLines", tail.to_string()));
                }
                self.send(&url, self.client.get(url.clone()).query(&query)).await
            }
            ClusterVerb::Restart => {
                let mut annotations = serde_json::Map::new();
                annotations.insert(
                    RESTARTED_AT.to_string(),
                    Value::String(chrono::Utc::now().to_rfc3339()),
                );
                let patch = json!({
                    "spec": { "template": { "metadata": { "annotations": annotations } } }
                });
                let builder = self
                    .client
                    .patch(url.clone())
                    .header(CONTENT_TYPE, STRATEGIC_MERGE_PATCH)
                    .body(patch.to_string());
                self.send(&url, builder).await?;
                Ok(format!("restarted {target}"))
            }
        }
    }
}

#[async_trait::async_trait]
impl Executor for ClusterExecutor {
    fn executor_type(&self) -> &str {
        Self::TYPE
    }

    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ExecutorError> {
        let command = match ClusterCommand::parse(&action.command, action.param_str("kind")) {
            Ok(command) => command,
            Err(reason) => return Ok(ActionOutcome::failure(reason)),
        };

        tracing::debug!(action_id = %action.action_id, ?command, "cluster command");
        let outcome = match self.run(command, action).await {
            Ok(output) => ActionOutcome::success(output),
            Err(error) => {
                tracing::warn!(action_id = %action.action_id, %error, "cluster command failed");
                ActionOutcome::failure(error)
            }
        };
        Ok(outcome)
    }
}

fn tail_lines(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Kubernetes `Status` error body
#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: Option<u16>,
    reason: Option<String>,
    message: Option<String>,
}

fn api_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiStatus>(body) {
        Ok(s) if s.reason.is_some() || s.message.is_some() => format!(
            "{} {}: {}",
            s.code.unwrap_or(status),
            s.reason.unwrap_or_else(|| "Unknown".to_string()),
            s.message.unwrap_or_default()
        ),
        _ if body.trim().is_empty() => format!("{status}: empty response"),
        _ => format!("{status}: {}", body.trim()),
    }
}
