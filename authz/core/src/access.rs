use crate::{Error, Identity, PermittedNamespaces, RequestContext, UpstreamError};
use std::sync::Arc;

/// The verb that access is reviewed for.
pub const VERB: &str = "list";

/// The resource that access is reviewed for.
pub const RESOURCE: &str = "pods";

/// Asks the cluster whether the client's identity may perform `verb` on
/// `resource` in `namespace`, where an empty namespace is cluster scope.
///
/// A failed review is an error, never a denial.
#[async_trait::async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check(&self, namespace: &str, verb: &str, resource: &str)
        -> Result<bool, UpstreamError>;
}

/// Lists the names of every namespace in the cluster.
#[async_trait::async_trait]
pub trait NamespaceLister: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>, UpstreamError>;
}

/// Looks up the namespace a cluster context uses when none is given.
pub trait DefaultNamespaces: Send + Sync {
    fn default_namespace(&self, kube_context: &str) -> String;
}

/// Hands out API clients for a cluster context, authenticated as a given
/// identity.
#[async_trait::async_trait]
pub trait Connections: DefaultNamespaces {
    type Client: PermissionChecker + NamespaceLister;

    async fn client(
        &self,
        kube_context: &str,
        identity: &Identity,
    ) -> Result<Self::Client, UpstreamError>;
}

/// Produces the set of namespaces the request's identity may access in a
/// cluster context.
#[async_trait::async_trait]
pub trait PermittedNamespacesProvider: Send + Sync {
    async fn permitted_namespaces(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<Arc<PermittedNamespaces>, Error>;
}

// === impl Arc<T> ===

impl<T: DefaultNamespaces + ?Sized> DefaultNamespaces for Arc<T> {
    fn default_namespace(&self, kube_context: &str) -> String {
        (**self).default_namespace(kube_context)
    }
}

#[async_trait::async_trait]
impl<T: Connections + ?Sized> Connections for Arc<T> {
    type Client = T::Client;

    async fn client(
        &self,
        kube_context: &str,
        identity: &Identity,
    ) -> Result<Self::Client, UpstreamError> {
        (**self).client(kube_context, identity).await
    }
}

#[async_trait::async_trait]
impl<T: PermittedNamespacesProvider + ?Sized> PermittedNamespacesProvider for Arc<T> {
    async fn permitted_namespaces(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<Arc<PermittedNamespaces>, Error> {
        (**self).permitted_namespaces(ctx, kube_context).await
    }
}
