//! Caches the namespaces each identity may access.
//!
//! Computing an identity's permitted namespaces costs one cluster-scoped
//! `SelfSubjectAccessReview` and, when that is denied, one review per
//! candidate namespace. Results are cached per `(cluster context, identity)`
//! for a fixed TTL. Each key has its own lock, held across the computation, so
//! concurrent lookups for an uncached key wait for a single computation rather
//! than each issuing a full scan.
//!
//! ```text
//! lookup(key) -> [ key lock ] -> [ entries ] -- hit --> snapshot
//!                                    |
//!                                   miss -> cluster review -> namespace reviews (concurrent) -> store
//! ```
//!
//! Entries expire lazily: a stale entry is removed just before it is
//! recomputed. Failures are returned to the caller and never cached.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod metrics;


pub use self::metrics::CacheMetrics;
use self::metrics::Scope;
use ahash::AHashMap as HashMap;
use futures::future;
use kubetail_authz_core::{
    Connections, Error, Identity, NamespaceLister, PermissionChecker, PermittedNamespaces,
    PermittedNamespacesProvider, RequestContext, UpstreamError, ALL_NAMESPACES, RESOURCE, VERB,
};
use parking_lot::{Mutex, RwLock};
use std::{collections::BTreeSet, sync::Arc};
use tokio::time;
use tracing::{debug, info, instrument, warn};

/// How long a computed result is served before it is recomputed.
pub const DEFAULT_TTL: time::Duration = time::Duration::from_secs(5 * 60);

/// A [`PermittedNamespacesProvider`] backed by `SelfSubjectAccessReview`s,
/// with per-identity caching.
#[derive(Debug)]
pub struct PermittedNamespacesCache<C> {
    connections: C,

    /// The operator's upper bound on namespace scope. Empty means RBAC alone
    /// decides.
    allowed_namespaces: Arc<[String]>,

    ttl: time::Duration,

    entries: RwLock<HashMap<CacheKey, CacheEntry>>,

    /// Serializes computations per key. Locks are never removed.
    locks: Mutex<HashMap<CacheKey, KeyLock>>,

    metrics: CacheMetrics,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    kube_context: String,
    identity: Identity,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    namespaces: Arc<PermittedNamespaces>,
    expires_at: time::Instant,
}

// === impl PermittedNamespacesCache ===

impl<C: Connections> PermittedNamespacesCache<C> {
    pub fn new(connections: C, allowed_namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            connections,
            allowed_namespaces: allowed_namespaces.into_iter().collect(),
            ttl: DEFAULT_TTL,
            entries: RwLock::default(),
            locks: Mutex::default(),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: time::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn allowed_namespaces(&self) -> &[String] {
        &self.allowed_namespaces
    }

    async fn lookup(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<Arc<PermittedNamespaces>, Error> {
        let key = CacheKey {
            kube_context: kube_context.to_string(),
            identity: ctx.identity().clone(),
        };

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        if let Some(namespaces) = self.cached(&key) {
            debug!(%kube_context, "Permitted namespaces cache hit");
            self.metrics.hit();
            return Ok(namespaces);
        }
        debug!(%kube_context, "Permitted namespaces cache miss");
        self.metrics.miss();

        let namespaces = match self.compute(ctx, kube_context).await {
            Ok(namespaces) => Arc::new(namespaces),
            Err(error) => {
                warn!(%kube_context, %error, "Failed to compute permitted namespaces");
                self.metrics.error();
                return Err(error);
            }
        };

        self.entries.write().insert(
            key,
            CacheEntry {
                namespaces: namespaces.clone(),
                expires_at: time::Instant::now() + self.ttl,
            },
        );

        Ok(namespaces)
    }

    fn key_lock(&self, key: &CacheKey) -> KeyLock {
        self.locks.lock().entry(key.clone()).or_default().clone()
    }

    /// Returns the unexpired entry for `key`, evicting it if it is stale.
    ///
    /// Must be called with the key's lock held.
    fn cached(&self, key: &CacheKey) -> Option<Arc<PermittedNamespaces>> {
        {
            let entries = self.entries.read();
            let entry = entries.get(key)?;
            if time::Instant::now() < entry.expires_at {
                return Some(entry.namespaces.clone());
            }
        }

        self.entries.write().remove(key);
        None
    }

    #[instrument(skip_all, fields(%kube_context))]
    async fn compute(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<PermittedNamespaces, Error> {
        let client = self.connections.client(kube_context, ctx.identity()).await?;

        self.metrics.review(Scope::Cluster);
        if client.check(ALL_NAMESPACES, VERB, RESOURCE).await? {
            info!("Cluster scope permitted");
            if self.allowed_namespaces.is_empty() {
                return Ok(PermittedNamespaces::All);
            }
            return Ok(PermittedNamespaces::restricted(
                self.allowed_namespaces.iter().cloned(),
            ));
        }

        let candidates = if self.allowed_namespaces.is_empty() {
            client.list_namespaces().await?
        } else {
            self.allowed_namespaces.to_vec()
        };
        let candidates = candidates.into_iter().collect::<BTreeSet<_>>();

        // The first failed review drops every other in-flight review.
        let reviews = candidates.into_iter().map(|ns| {
            let client = &client;
            async move {
                self.metrics.review(Scope::Namespace);
                let allowed = client.check(&ns, VERB, RESOURCE).await?;
                Ok::<_, UpstreamError>(allowed.then_some(ns))
            }
        });
        let permitted = future::try_join_all(reviews)
            .await?
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>();

        info!(permitted = permitted.len(), "Namespace scope reviewed");
        Ok(PermittedNamespaces::Restricted(permitted))
    }
}

#[async_trait::async_trait]
impl<C: Connections> PermittedNamespacesProvider for PermittedNamespacesCache<C> {
    async fn permitted_namespaces(
        &self,
        ctx: &RequestContext,
        kube_context: &str,
    ) -> Result<Arc<PermittedNamespaces>, Error> {
        ctx.run(self.lookup(ctx, kube_context)).await
    }
}
