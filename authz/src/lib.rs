#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Namespace authorization for log viewers.
//!
//! Callers name a namespace (or all namespaces) and get back the namespace
//! or namespaces they are permitted to read pod logs from, as determined by
//! Kubernetes RBAC and an optional operator allow-list.

pub use kubetail_authz_core::{
    allowlist, Error, Identity, NamespaceArg, NamespaceResolver, PermittedNamespaces,
    RequestContext, UpstreamError,
};
pub use kubetail_authz_index::{CacheMetrics, PermittedNamespacesCache, DEFAULT_TTL};
pub use kubetail_authz_k8s::{KubeClient, KubeConnections, LoadError};
pub use kubetail_authz_runtime::{Args, AuthzConfig, KubeNamespaceResolver};
