#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use kubetail_authz_core as core;
pub use kubetail_authz_index as index;
pub use kubetail_authz_k8s as k8s;

mod args;

pub use self::args::Args;

use self::{
    core::NamespaceResolver,
    index::{CacheMetrics, PermittedNamespacesCache},
    k8s::KubeConnections,
};
use std::sync::Arc;
use tokio::time;

/// A resolver backed by the Kubernetes API.
pub type KubeNamespaceResolver =
    NamespaceResolver<PermittedNamespacesCache<Arc<KubeConnections>>, Arc<KubeConnections>>;

/// Process-wide authorization settings, fixed at startup.
#[derive(Clone, Debug)]
pub struct AuthzConfig {
    /// The upper bound on namespace scope regardless of RBAC. Empty means no
    /// restriction.
    pub allowed_namespaces: Vec<String>,

    /// How long a caller's permitted namespaces are cached.
    pub cache_ttl: time::Duration,
}

// === impl AuthzConfig ===

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            allowed_namespaces: Vec::new(),
            cache_ttl: index::DEFAULT_TTL,
        }
    }
}

impl AuthzConfig {
    pub fn build_resolver(
        &self,
        connections: KubeConnections,
        metrics: CacheMetrics,
    ) -> KubeNamespaceResolver {
        let connections = Arc::new(connections);
        let cache =
            PermittedNamespacesCache::new(connections.clone(), self.allowed_namespaces.clone())
                .with_ttl(self.cache_ttl)
                .with_metrics(metrics);
        NamespaceResolver::new(cache, connections)
    }
}
