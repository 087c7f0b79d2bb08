//! Remedy Executors
//!
//! Executors perform one category of remediation operation against a
//! backend system. The [`ExecutorRegistry`] maps a type identifier to a
//! constructor and caches what it builds, so the enforcer never branches on
//! executor type.
//!
//! # Built-in executors
//!
//! | type      | backend                                         |
//! |-----------|-------------------------------------------------|
//! | `cluster` | Kubernetes API (read, delete, logs, restart)    |
//! | `gitops`  | Argo CD style application API (sync, status)    |
//! | `script`  | local script under an allow-listed directory    |
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_executor::{ExecutorConfigBundle, ExecutorRegistry};
//! use serde_json::json;
//!
//! let registry = ExecutorRegistry::with_builtins();
//! let bundle = ExecutorConfigBundle::new()
//!     .with("cluster", json!({ "api_url": "https://10.0.0.1:6443", "token": "..." }));
//!
//! let executor = registry.resolve("cluster", &bundle).await?;
//! let outcome = executor.execute(&action).await?;
//! ```

#![warn(unreachable_pub)]

pub mod builtin;
mod command;
mod config;
mod error;
mod executor;
mod registry;

pub use command::{command_tokens, normalize_command};
pub use config::ExecutorConfigBundle;
pub use error::{ExecutorError, ResolutionError};
pub use executor::Executor;
pub use registry::{ExecutorFactory, ExecutorRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
