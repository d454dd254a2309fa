use crate::KubeClient;
use ahash::AHashMap as HashMap;
use kube::config::{AuthInfo, Config, InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kubetail_authz_core::{Connections, DefaultNamespaces, Identity, UpstreamError, DEFAULT_NAMESPACE};
use parking_lot::Mutex;
use std::{fmt, path::Path};
use tracing::{debug, info, warn};

/// Holds the client configuration of every known cluster context.
///
/// An empty context name refers to the kubeconfig's current context, or to
/// the cluster this process runs in.
///
/// Clients are built once per context and identity, then reused. Like the
/// cache's per-key locks, they are never removed.
pub struct KubeConnections {
    configs: HashMap<String, Config>,
    current_context: String,
    clients: Mutex<HashMap<ClientKey, KubeClient>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClientKey {
    kube_context: String,
    identity: Identity,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("failed to load in-cluster config: {0}")]
    InCluster(#[from] InClusterError),

    #[error("kubeconfig has no usable contexts")]
    NoContexts,
}

// === impl KubeConnections ===

impl KubeConnections {
    /// Loads the kubeconfig at `path`, or from `$KUBECONFIG` and the default
    /// location when no path is given.
    pub async fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let kubeconfig = match path {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        Self::from_kubeconfig(kubeconfig).await
    }

    /// Builds a config for each of the kubeconfig's contexts. Contexts that
    /// cannot be loaded are skipped.
    pub async fn from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Self, LoadError> {
        let mut configs = HashMap::with_capacity(kubeconfig.contexts.len());
        for context in &kubeconfig.contexts {
            let options = KubeConfigOptions {
                context: Some(context.name.clone()),
                ..KubeConfigOptions::default()
            };
            match Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await {
                Ok(config) => {
                    debug!(context = %context.name, cluster = %config.cluster_url, "Loaded context");
                    configs.insert(context.name.clone(), config);
                }
                Err(error) => {
                    warn!(context = %context.name, %error, "Skipping unusable context");
                }
            }
        }

        if configs.is_empty() {
            return Err(LoadError::NoContexts);
        }

        let current_context = kubeconfig.current_context.unwrap_or_default();
        info!(contexts = configs.len(), %current_context, "Loaded kubeconfig");
        Ok(Self {
            configs,
            current_context,
            clients: Mutex::default(),
        })
    }

    /// Uses the service account of the pod this process runs in, under the
    /// empty context name.
    pub fn in_cluster() -> Result<Self, LoadError> {
        let config = Config::incluster()?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let mut configs = HashMap::with_capacity(1);
        configs.insert(String::new(), config);
        Self {
            configs,
            current_context: String::new(),
            clients: Mutex::default(),
        }
    }

    pub fn current_context(&self) -> &str {
        &self.current_context
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> + '_ {
        self.configs.keys().map(String::as_str)
    }

    fn get(&self, kube_context: &str) -> Option<&Config> {
        self.configs.get(self.resolve_context(kube_context))
    }

    fn resolve_context<'a>(&'a self, kube_context: &'a str) -> &'a str {
        if kube_context.is_empty() {
            &self.current_context
        } else {
            kube_context
        }
    }

    /// The client config for `kube_context`, authenticated as `identity`.
    ///
    /// A bearer identity replaces the context's configured credentials
    /// entirely; an anonymous identity keeps them.
    pub(crate) fn config(
        &self,
        kube_context: &str,
        identity: &Identity,
    ) -> Result<Config, UpstreamError> {
        let mut config = self.get(kube_context).cloned().ok_or_else(|| {
            UpstreamError::new(
                "failed to build client",
                format!("unknown kube context {kube_context:?}"),
            )
        })?;

        if let Some(token) = identity.token() {
            config.auth_info = AuthInfo {
                token: Some(token.to_string().into()),
                ..AuthInfo::default()
            };
        }

        Ok(config)
    }
}

impl fmt::Debug for KubeConnections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut contexts = self.contexts().collect::<Vec<_>>();
        contexts.sort_unstable();
        f.debug_struct("KubeConnections")
            .field("contexts", &contexts)
            .field("current_context", &self.current_context)
            .field("clients", &self.clients.lock().len())
            .finish()
    }
}

impl DefaultNamespaces for KubeConnections {
    fn default_namespace(&self, kube_context: &str) -> String {
        self.get(kube_context)
            .map(|config| config.default_namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }
}

#[async_trait::async_trait]
impl Connections for KubeConnections {
    type Client = KubeClient;

    async fn client(
        &self,
        kube_context: &str,
        identity: &Identity,
    ) -> Result<KubeClient, UpstreamError> {
        let key = ClientKey {
            kube_context: self.resolve_context(kube_context).to_string(),
            identity: identity.clone(),
        };
        if let Some(client) = self.clients.lock().get(&key) {
            return Ok(client.clone());
        }

        let config = self.config(kube_context, identity)?;
        let client = kube::Client::try_from(config)
            .map(KubeClient::new)
            .map_err(|error| UpstreamError::new("failed to build client", error))?;
        debug!(kube_context = %key.kube_context, "Built client");

        // A concurrent caller may have built one first; keep theirs.
        Ok(self.clients.lock().entry(key).or_insert(client).clone())
    }
}
