//! Built-in executors

mod cluster;
mod gitops;
mod http;
mod kubeconfig;
mod script;

pub use cluster::{ClusterCommand, ClusterExecutor, ClusterVerb, ResourceKind};
pub use gitops::GitOpsExecutor;
pub use kubeconfig::KubeEndpoint;
pub use script::ScriptExecutor;

fn default_true() -> bool {
    true
}
