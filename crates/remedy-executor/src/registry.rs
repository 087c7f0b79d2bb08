//! Executor registry
//!
//! Provides [`ExecutorRegistry`], which resolves a type identifier plus the
//! host's [`ExecutorConfigBundle`] to a live executor.
//!
//! Constructed executors are cached per (type, settings digest). The cache
//! coalesces concurrent resolutions of the same key, so an expensive backend
//! client is built at most once even when many enforcement runs resolve it at
//! the same moment. Failed constructions are not cached.

use crate::builtin::{ClusterExecutor, GitOpsExecutor, ScriptExecutor};
use crate::config::{normalize_type, ExecutorConfigBundle};
use crate::error::ResolutionError;
use crate::executor::Executor;
use moka::future::Cache;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Constructor closure registered under a type identifier
pub type ExecutorFactory =
    dyn Fn(&Value) -> Result<Arc<dyn Executor>, ResolutionError> + Send + Sync;

const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Registry of executor constructors with a construction cache
#[derive(Clone)]
pub struct ExecutorRegistry {
    factories: HashMap<String, Arc<ExecutorFactory>>,
    cache: Cache<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create empty registry caching at most `capacity` executors
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            factories: HashMap::new(),
            cache: Cache::new(capacity),
        }
    }

    /// Create registry with the built-in executors
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ClusterExecutor::TYPE, |settings| {
            Ok(Arc::new(ClusterExecutor::from_settings(settings)?) as Arc<dyn Executor>)
        });
        registry.register(GitOpsExecutor::TYPE, |settings| {
            Ok(Arc::new(GitOpsExecutor::from_settings(settings)?) as Arc<dyn Executor>)
        });
        registry.register(ScriptExecutor::TYPE, |settings| {
            Ok(Arc::new(ScriptExecutor::from_settings(settings)?) as Arc<dyn Executor>)
        });
        registry
    }

    /// Register a constructor, replacing any previous one for the type
    pub fn register<F>(&mut self, executor_type: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Executor>, ResolutionError> + Send + Sync + 'static,
    {
        self.factories
            .insert(normalize_type(executor_type), Arc::new(factory));
        // constructions by a replaced factory must not be served again
        self.cache.invalidate_all();
    }

    /// Check if a type is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, executor_type: &str) -> bool {
        self.factories.contains_key(&normalize_type(executor_type))
    }

    /// Registered type identifiers, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolve an executor for `executor_type` using its bundle settings
    ///
    /// # Errors
    /// - `ResolutionError::UnknownType` when nothing is registered for the type
    /// - whatever the constructor reports for missing or invalid settings
    pub async fn resolve(
        &self,
        executor_type: &str,
        bundle: &ExecutorConfigBundle,
    ) -> Result<Arc<dyn Executor>, ResolutionError> {
        let key_type = normalize_type(executor_type);
        let factory = self
            .factories
            .get(&key_type)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownType(executor_type.to_string()))?;

        let settings = bundle.get(&key_type).cloned().unwrap_or(Value::Null);
        let key = cache_key(&key_type, &settings);

        self.cache
            .try_get_with(key, async move {
                tracing::debug!(executor_type = %key_type, "constructing executor");
                factory(&settings)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Approximate number of cached executors
    #[must_use]
    pub async fn cached_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Drop every cached executor (e.g. after credential rotation)
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("types", &self.names())
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

/// Cache key: type plus a BLAKE3 digest of the canonical settings JSON
fn cache_key(executor_type: &str, settings: &Value) -> String {
    // serde_json maps are ordered, so equal settings serialize identically
    let canonical = serde_json::to_vec(settings).unwrap_or_default();
    format!("{executor_type}:{}", blake3::hash(&canonical).to_hex())
}
