use crate::error::ResolutionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Backend settings keyed by executor type identifier
///
/// Owned by the host process and injected at executor construction; never
/// stored alongside incidents or plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorConfigBundle {
    settings: BTreeMap<String, Value>,
}

impl ExecutorConfigBundle {
    /// Create empty bundle
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With settings for one executor type
    #[inline]
    #[must_use]
    pub fn with(mut self, executor_type: &str, settings: Value) -> Self {
        self.insert(executor_type, settings);
        self
    }

    /// Set settings for one executor type
    pub fn insert(&mut self, executor_type: &str, settings: Value) {
        self.settings.insert(normalize_type(executor_type), settings);
    }

    /// Settings for one executor type
    #[must_use]
    pub fn get(&self, executor_type: &str) -> Option<&Value> {
        let key = normalize_type(executor_type);
        self.settings.get(&key).or_else(|| {
            // keys deserialized from a file are not normalized on the way in
            self.settings
                .iter()
                .find(|(k, _)| normalize_type(k) == key)
                .map(|(_, v)| v)
        })
    }

    /// Configured executor types
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }
}

pub(crate) fn normalize_type(executor_type: &str) -> String {
    executor_type.trim().to_ascii_lowercase()
}

/// Deserialize one executor's settings; an absent section reads as `{}`
pub(crate) fn parse_settings<T: DeserializeOwned>(
    executor: &str,
    settings: &Value,
) -> Result<T, ResolutionError> {
    let value = if settings.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        settings.clone()
    };
    serde_json::from_value(value).map_err(|e| ResolutionError::invalid(executor, e.to_string()))
}

/// Unwrap a required setting
pub(crate) fn require<T>(executor: &str, field: &str, value: Option<T>) -> Result<T, ResolutionError> {
    value.ok_or_else(|| ResolutionError::missing(executor, field))
}
