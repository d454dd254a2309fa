use crate::{
    DefaultNamespaces, Error, NamespaceArg, PermittedNamespaces, PermittedNamespacesProvider,
    RequestContext, ALL_NAMESPACES,
};
use std::sync::Arc;
use tracing::debug;


/// Dereferences namespace arguments against the namespaces the caller is
/// permitted to access.
///
/// Resolution is a pure policy over the provider's current snapshot; all
/// state lives in the provider.
#[derive(Clone, Debug)]
pub struct NamespaceResolver<P, D> {
    provider: P,
    defaults: D,
}

// === impl NamespaceResolver ===

impl<P, D> NamespaceResolver<P, D>
where
    P: PermittedNamespacesProvider,
    D: DefaultNamespaces,
{
    pub fn new(provider: P, defaults: D) -> Self {
        Self { provider, defaults }
    }

    /// Resolves `arg` to a single namespace.
    ///
    /// - [`NamespaceArg::Default`] becomes the context's default namespace.
    /// - The result must be a permitted namespace. An explicit request for all
    ///   namespaces (`""`) is only satisfied when every namespace is
    ///   permitted.
    /// - [`NamespaceArg::Bypass`] returns `""` without any lookups.
    pub async fn deref_namespace(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
        arg: NamespaceArg,
    ) -> Result<String, Error> {
        let Some(ns) = arg.deref_or_else(|| self.defaults.default_namespace(kube_context)) else {
            return Ok(ALL_NAMESPACES.to_string());
        };

        let permitted = self.provider.permitted_namespaces(ctx, kube_context).await?;
        authorize(&permitted, ns)
    }

    /// Resolves `arg` to a list of namespaces.
    ///
    /// Behaves like [`Self::deref_namespace`], except that an explicit request
    /// for all namespaces returns every permitted namespace. When every
    /// namespace is permitted, that is `[""]`.
    pub async fn deref_namespace_to_list(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
        arg: NamespaceArg,
    ) -> Result<Vec<String>, Error> {
        let Some(ns) = arg.deref_or_else(|| self.defaults.default_namespace(kube_context)) else {
            return Ok(vec![ALL_NAMESPACES.to_string()]);
        };

        let permitted = self.provider.permitted_namespaces(ctx, kube_context).await?;
        authorize_list(&permitted, ns)
    }

    pub async fn permitted_namespaces(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<Arc<PermittedNamespaces>, Error> {
        self.provider.permitted_namespaces(ctx, kube_context).await
    }
}

fn authorize(permitted: &PermittedNamespaces, ns: String) -> Result<String, Error> {
    if permitted.is_empty() || !permitted.contains(&ns) {
        debug!(namespace = %ns, "Namespace not permitted");
        return Err(Error::Forbidden);
    }
    Ok(ns)
}

fn authorize_list(permitted: &PermittedNamespaces, ns: String) -> Result<Vec<String>, Error> {
    if permitted.is_empty() {
        debug!("No namespaces permitted");
        return Err(Error::Forbidden);
    }

    if ns == ALL_NAMESPACES {
        return Ok(permitted.to_list());
    }

    authorize(permitted, ns).map(|ns| vec![ns])
}
