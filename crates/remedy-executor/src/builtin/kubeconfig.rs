//! Minimal kubeconfig reader
//!
//! Only what the cluster executor needs: the current context's API server,
//! its TLS verification flag and the user's bearer token.

use crate::error::ResolutionError;
use serde::Deserialize;
use std::path::Path;

/// API server location and credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeEndpoint {
    /// API server URL
    pub server: String,
    /// Bearer token, if the user entry carries one
    pub token: Option<String>,
    /// Whether the kubeconfig asks to skip TLS verification
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeConfig {
    current_context: Option<String>,
    #[serde(default)]
    contexts: Vec<Named<ContextEntry>>,
    #[serde(default)]
    clusters: Vec<Named<ClusterEntry>>,
    #[serde(default)]
    users: Vec<Named<UserEntry>>,
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(alias = "context", alias = "cluster", alias = "user")]
    value: T,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    token: Option<String>,
}

const EXECUTOR: &str = "cluster";

impl KubeEndpoint {
    /// Load the current context from a kubeconfig file
    ///
    /// # Errors
    /// `ResolutionError::InvalidConfig` when the file is unreadable, not
    /// YAML, or the current context points at missing entries.
    pub fn load(path: &Path) -> Result<Self, ResolutionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ResolutionError::invalid(EXECUTOR, format!("cannot read kubeconfig {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Parse kubeconfig YAML
    ///
    /// # Errors
    /// See [`KubeEndpoint::load`].
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        let config: KubeConfig = serde_yaml::from_str(raw)
            .map_err(|e| ResolutionError::invalid(EXECUTOR, format!("malformed kubeconfig: {e}")))?;

        let context_name = config
            .current_context
            .as_deref()
            .or_else(|| config.contexts.first().map(|c| c.name.as_str()))
            .ok_or_else(|| ResolutionError::invalid(EXECUTOR, "kubeconfig has no contexts"))?;

        let context = find(&config.contexts, context_name, "context")?;
        let cluster = find(&config.clusters, &context.cluster, "cluster")?;
        let token = match &context.user {
            Some(user) => find(&config.users, user, "user")?.token.clone(),
            None => None,
        };

        Ok(Self {
            server: cluster.server.clone(),
            token,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
        })
    }
}

fn find<'a, T>(entries: &'a [Named<T>], name: &str, what: &str) -> Result<&'a T, ResolutionError> {
    entries
        .iter()
        .find(|e| e.name == name)
        .map(|e| &e.value)
        .ok_or_else(|| ResolutionError::invalid(EXECUTOR, format!("kubeconfig {what} '{name}' not found")))
}
