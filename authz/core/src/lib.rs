//! Permission-aware namespace resolution.
//!
//! Requests against a cluster carry an optional namespace argument. Before any
//! Kubernetes resource is read on behalf of a caller, the argument is resolved
//! against the namespaces that caller may actually access:
//!
//! ```text
//! [ NamespaceArg ] -> [ NamespaceResolver ] -> [ PermittedNamespacesProvider ] -> [ PermissionChecker ]
//! ```
//!
//! The provider answers "which namespaces may this identity list pods in?" by
//! issuing `SelfSubjectAccessReview`s. This crate holds the types and policy;
//! the caching provider lives in `kubetail-authz-index` and the Kubernetes
//! client implementations in `kubetail-authz-k8s`.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod access;
pub mod allowlist;
mod context;
mod error;
mod identity;
mod namespace;
pub mod resolver;

pub use self::{
    access::{
        Connections, DefaultNamespaces, NamespaceLister, PermissionChecker,
        PermittedNamespacesProvider, RESOURCE, VERB,
    },
    context::RequestContext,
    error::{BoxError, Error, Result, UpstreamError},
    identity::Identity,
    namespace::{NamespaceArg, PermittedNamespaces, ALL_NAMESPACES, DEFAULT_NAMESPACE},
    resolver::NamespaceResolver,
};
