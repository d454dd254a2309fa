use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counters describing how the permitted-namespaces cache is used.
///
/// An unregistered instance counts but is never exported.
#[derive(Clone, Debug, Default)]
pub struct CacheMetrics {
    lookups: Family<LookupLabels, Counter>,
    reviews: Family<ReviewLabels, Counter>,
    errors: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct LookupLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReviewLabels {
    scope: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    Cluster,
    Namespace,
}

// === impl CacheMetrics ===

impl CacheMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();

        reg.register(
            "lookups",
            "Count of permitted namespace lookups by cache result",
            metrics.lookups.clone(),
        );

        reg.register(
            "reviews",
            "Count of SelfSubjectAccessReviews issued by scope",
            metrics.reviews.clone(),
        );

        reg.register(
            "errors",
            "Count of permitted namespace computations that failed",
            metrics.errors.clone(),
        );

        metrics
    }

    pub(crate) fn hit(&self) {
        self.lookups
            .get_or_create(&LookupLabels { result: "hit" })
            .inc();
    }

    pub(crate) fn miss(&self) {
        self.lookups
            .get_or_create(&LookupLabels { result: "miss" })
            .inc();
    }

    pub(crate) fn review(&self, scope: Scope) {
        let scope = match scope {
            Scope::Cluster => "cluster",
            Scope::Namespace => "namespace",
        };
        self.reviews.get_or_create(&ReviewLabels { scope }).inc();
    }

    pub(crate) fn error(&self) {
        self.errors.inc();
    }

    #[cfg(test)]
    pub(crate) fn hits(&self) -> u64 {
        self.lookups
            .get_or_create(&LookupLabels { result: "hit" })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn misses(&self) -> u64 {
        self.lookups
            .get_or_create(&LookupLabels { result: "miss" })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn errors(&self) -> u64 {
        self.errors.get()
    }
}
