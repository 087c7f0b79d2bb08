//! Host configuration
//!
//! ```toml
//! [enforcer]
//! max_retries = 3
//! retry_delay_secs = 5
//! deadline_secs = 600
//!
//! [executors.cluster]
//! kubeconfig = "/etc/remedy/kubeconfig"
//!
//! [executors.script]
//! allowed_dir = "/opt/remedy/scripts"
//!
//! [[severity_rules]]
//! keywords = ["oomkilled"]
//! severity = "critical"
//! ```
//!
//! Every section is optional. YAML with the same shape is accepted for
//! `.yaml` / `.yml` files.

use crate::enforcer::EnforcerConfig;
use crate::plan::PlanRule;
use crate::severity::SeverityRules;
use remedy_executor::ExecutorConfigBundle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed YAML
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Extension is neither TOML nor YAML
    #[error("unsupported config format: {0} (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),
}

/// `[enforcer]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerSettings {
    /// Extra attempts per action
    pub max_retries: u32,
    /// Seconds between attempts
    pub retry_delay_secs: u64,
    /// Overall per-run deadline in seconds
    pub deadline_secs: Option<u64>,
}

impl Default for EnforcerSettings {
    fn default() -> Self {
        let defaults = EnforcerConfig::default();
        Self {
            max_retries: defaults.max_retries,
            retry_delay_secs: defaults.retry_delay.as_secs(),
            deadline_secs: None,
        }
    }
}

impl EnforcerSettings {
    /// Retry policy
    #[must_use]
    pub fn enforcer_config(&self) -> EnforcerConfig {
        EnforcerConfig::new()
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
    }

    /// Run deadline, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemedyConfig {
    /// Retry policy and deadline
    pub enforcer: EnforcerSettings,
    /// Backend settings keyed by executor type
    pub executors: ExecutorConfigBundle,
    /// Replacement severity table
    pub severity_rules: Option<SeverityRules>,
    /// Replacement plan rule table
    pub plan_rules: Option<Vec<PlanRule>>,
}

impl RemedyConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// [`ConfigError`] for unreadable files, parse failures and unknown
    /// extensions.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parse: fn(&str) -> Result<Self, ConfigError> = match extension.as_deref() {
            Some("toml") => Self::from_toml_str,
            Some("yaml" | "yml") => Self::from_yaml_str,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = parse(&raw)?;
        tracing::debug!(path = %path.display(), executors = config.executors.types().count(), "loaded config");
        Ok(config)
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `ConfigError::Toml` on malformed input.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Parse YAML
    ///
    /// # Errors
    /// `ConfigError::Yaml` on malformed input.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}
