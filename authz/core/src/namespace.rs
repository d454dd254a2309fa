use std::collections::BTreeSet;

/// The namespace value that means "every namespace".
pub const ALL_NAMESPACES: &str = "";

/// The namespace used when nothing else selects one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A caller-supplied namespace argument.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NamespaceArg {
    /// No namespace was given; use the cluster context's default namespace.
    #[default]
    Default,

    /// Every namespace was requested explicitly.
    All,

    Specific(String),

    /// Skips authorization entirely.
    ///
    /// Only trusted, system-internal call paths may construct this; it must
    /// never be derived from client input.
    Bypass,
}

/// The namespaces an identity may access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermittedNamespaces {
    /// Cluster-wide access with no operator allow-list in force.
    All,

    /// An explicit set of namespaces. Empty means nothing is permitted.
    Restricted(BTreeSet<String>),
}

// === impl NamespaceArg ===

impl NamespaceArg {
    /// Maps an empty name to [`NamespaceArg::All`].
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self::All
        } else {
            Self::Specific(name)
        }
    }

    /// Returns the concrete namespace value, where the empty string means all
    /// namespaces, or `None` for [`NamespaceArg::Bypass`].
    ///
    /// `default` is only evaluated for [`NamespaceArg::Default`].
    pub fn deref_or_else(self, default: impl FnOnce() -> String) -> Option<String> {
        match self {
            Self::Default => Some(default()),
            Self::All => Some(ALL_NAMESPACES.to_string()),
            Self::Specific(ns) => Some(ns),
            Self::Bypass => None,
        }
    }
}

impl From<Option<String>> for NamespaceArg {
    fn from(ns: Option<String>) -> Self {
        ns.map(Self::named).unwrap_or_default()
    }
}

impl From<Option<&str>> for NamespaceArg {
    fn from(ns: Option<&str>) -> Self {
        ns.map(Self::named).unwrap_or_default()
    }
}

// === impl PermittedNamespaces ===

impl PermittedNamespaces {
    pub fn restricted<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Restricted(namespaces.into_iter().map(Into::into).collect())
    }

    pub fn none() -> Self {
        Self::Restricted(BTreeSet::new())
    }

    /// True when nothing at all is permitted.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Restricted(namespaces) => namespaces.is_empty(),
        }
    }

    pub fn contains(&self, ns: &str) -> bool {
        match self {
            Self::All => true,
            Self::Restricted(namespaces) => namespaces.contains(ns),
        }
    }

    /// The list form, in which all namespaces are represented as `[""]`.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::All => vec![ALL_NAMESPACES.to_string()],
            Self::Restricted(namespaces) => namespaces.iter().cloned().collect(),
        }
    }
}
