use crate::{
    core::{
        DefaultNamespaces, Identity, NamespaceArg, NamespaceResolver, PermittedNamespacesProvider,
        RequestContext,
    },
    index::CacheMetrics,
    k8s::KubeConnections,
    AuthzConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use serde::Serialize;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[clap(
    name = "kubetail-authz",
    about = "Resolves the namespaces a caller may read pod logs from"
)]
pub struct Args {
    #[clap(long, default_value = "kubetail=info,warn", env = "KUBETAIL_AUTHZ_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Path to a kubeconfig. Defaults to `$KUBECONFIG` or `~/.kube/config`.
    #[clap(long)]
    kubeconfig: Option<PathBuf>,

    /// Uses this pod's service account instead of a kubeconfig.
    #[clap(long, conflicts_with = "kubeconfig")]
    in_cluster: bool,

    /// Namespaces callers may ever be granted, regardless of RBAC.
    ///
    /// Empty places no restriction beyond RBAC.
    #[clap(long, default_value = "", env = "KUBETAIL_ALLOWED_NAMESPACES")]
    allowed_namespaces: Namespaces,

    #[clap(long, default_value = "300")]
    cache_ttl_secs: u64,

    #[clap(long, default_value = "10000")]
    timeout_ms: u64,

    /// The kube context to resolve against. Empty means the current context.
    #[clap(long, default_value = "")]
    context: String,

    #[clap(long, short = 'n')]
    namespace: Option<String>,

    #[clap(long, short = 'A', conflicts_with = "namespace")]
    all_namespaces: bool,

    /// A bearer token to resolve as. Without one, the configured credentials
    /// are used.
    #[clap(
        long = "token",
        env = "KUBETAIL_TOKEN",
        hide_env_values = true,
        value_parser = parse_bearer
    )]
    identity: Option<Identity>,

    /// Resolves to a list of namespaces.
    #[clap(long)]
    list: bool,

    /// Prints cache metrics after resolving.
    #[clap(long)]
    metrics: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Namespaces(Vec<String>);

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Resolution {
    kube_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespaces: Option<Vec<String>>,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let config = self.authz_config();
        let Self {
            log_level,
            log_format,
            kubeconfig,
            in_cluster,
            timeout_ms,
            context,
            namespace,
            all_namespaces,
            identity,
            list,
            metrics,
            ..
        } = self;

        log_format.try_init(log_level)?;

        let connections = if in_cluster {
            KubeConnections::in_cluster()?
        } else {
            KubeConnections::load(kubeconfig.as_deref()).await?
        };

        let mut prom = <Registry>::default();
        let cache_metrics =
            CacheMetrics::register(prom.sub_registry_with_prefix("permitted_namespaces_cache"));
        let resolver = config.build_resolver(connections, cache_metrics);

        let ctx = RequestContext::new(identity.unwrap_or_default())
            .with_timeout(Duration::from_millis(timeout_ms));
        let arg = if all_namespaces {
            NamespaceArg::All
        } else {
            NamespaceArg::from(namespace)
        };
        info!(kube_context = %context, ?arg, list, "Resolving");

        let resolution = resolve(&resolver, &ctx, context, arg, list).await?;
        println!("{}", serde_json::to_string_pretty(&resolution)?);

        if metrics {
            let mut buf = String::new();
            prometheus_client::encoding::text::encode(&mut buf, &prom)?;
            print!("{buf}");
        }

        Ok(())
    }

    fn authz_config(&self) -> AuthzConfig {
        let Namespaces(allowed_namespaces) = self.allowed_namespaces.clone();
        AuthzConfig {
            allowed_namespaces,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

async fn resolve<P, D>(
    resolver: &NamespaceResolver<P, D>,
    ctx: &RequestContext,
    kube_context: String,
    arg: NamespaceArg,
    list: bool,
) -> Result<Resolution>
where
    P: PermittedNamespacesProvider,
    D: DefaultNamespaces,
{
    let mut resolution = Resolution {
        kube_context,
        namespace: None,
        namespaces: None,
    };

    if list {
        let namespaces = resolver
            .deref_namespace_to_list(ctx, &resolution.kube_context, arg)
            .await
            .with_context(|| {
                format!("failed to resolve namespaces in {:?}", resolution.kube_context)
            })?;
        debug!(?namespaces);
        resolution.namespaces = Some(namespaces);
    } else {
        let namespace = resolver
            .deref_namespace(ctx, &resolution.kube_context, arg)
            .await
            .with_context(|| {
                format!("failed to resolve namespace in {:?}", resolution.kube_context)
            })?;
        debug!(%namespace);
        resolution.namespace = Some(namespace);
    }

    Ok(resolution)
}

fn parse_bearer(token: &str) -> Result<Identity, std::convert::Infallible> {
    Ok(Identity::bearer(token))
}

// === impl Namespaces ===

impl std::str::FromStr for Namespaces {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let namespaces = s
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();
        Ok(Self(namespaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Error, PermittedNamespaces};
    use std::sync::Arc;

    struct Fixed(PermittedNamespaces);

    #[async_trait::async_trait]
    impl PermittedNamespacesProvider for Fixed {
        async fn permitted_namespaces(
            &self,
            _: &RequestContext,
            _: &str,
        ) -> Result<Arc<PermittedNamespaces>, Error> {
            Ok(Arc::new(self.0.clone()))
        }
    }

    struct Defaults;

    impl DefaultNamespaces for Defaults {
        fn default_namespace(&self, _: &str) -> String {
            "team-a".to_string()
        }
    }

    fn resolver(permitted: PermittedNamespaces) -> NamespaceResolver<Fixed, Defaults> {
        NamespaceResolver::new(Fixed(permitted), Defaults)
    }

    #[test]
    fn parses_namespaces() {
        let Namespaces(namespaces) = " ns1, ,ns2,".parse().unwrap();
        assert_eq!(namespaces, ["ns1", "ns2"]);

        let Namespaces(namespaces) = "".parse().unwrap();
        assert!(namespaces.is_empty());
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["kubetail-authz"]).unwrap();
        let config = args.authz_config();
        assert!(config.allowed_namespaces.is_empty());
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_ttl, AuthzConfig::default().cache_ttl);
        assert_eq!(args.timeout_ms, 10_000);
        assert_eq!(args.context, "");
        assert!(!args.in_cluster);
        assert!(!args.list);
    }

    #[test]
    fn allowed_namespaces_and_ttl() {
        let args = Args::try_parse_from([
            "kubetail-authz",
            "--allowed-namespaces=ns1,ns2",
            "--cache-ttl-secs=30",
            "--context=kind-dev",
            "-n",
            "ns1",
            "--list",
        ])
        .unwrap();
        let config = args.authz_config();
        assert_eq!(config.allowed_namespaces, ["ns1", "ns2"]);
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(args.context, "kind-dev");
        assert_eq!(args.namespace.as_deref(), Some("ns1"));
        assert!(args.list);
    }

    #[test]
    fn token_is_redacted() {
        let args = Args::try_parse_from(["kubetail-authz", "--token=s3cr3t"]).unwrap();
        let identity = args.identity.clone().unwrap();
        assert_eq!(identity.token(), Some("s3cr3t"));

        let debug = format!("{args:?}");
        assert!(!debug.contains("s3cr3t"), "{debug}");
    }

    #[test]
    fn conflicting_flags() {
        assert!(Args::try_parse_from(["kubetail-authz", "-A", "-n", "ns1"]).is_err());
        assert!(
            Args::try_parse_from(["kubetail-authz", "--in-cluster", "--kubeconfig=/tmp/kc"])
                .is_err()
        );
    }

    #[tokio::test]
    async fn resolves_single_namespace() {
        let resolver = resolver(PermittedNamespaces::restricted(["team-a"]));
        let ctx = RequestContext::default();

        let resolution = resolve(
            &resolver,
            &ctx,
            "kind-dev".to_string(),
            NamespaceArg::Default,
            false,
        )
        .await
        .unwrap();
        assert_eq!(
            resolution,
            Resolution {
                kube_context: "kind-dev".to_string(),
                namespace: Some("team-a".to_string()),
                namespaces: None,
            }
        );
        assert_eq!(
            serde_json::to_value(&resolution).unwrap(),
            serde_json::json!({ "kubeContext": "kind-dev", "namespace": "team-a" })
        );
    }

    #[tokio::test]
    async fn resolves_namespace_list() {
        let resolver = resolver(PermittedNamespaces::restricted(["team-a", "team-b"]));
        let ctx = RequestContext::default();

        let resolution = resolve(&resolver, &ctx, String::new(), NamespaceArg::All, true)
            .await
            .unwrap();
        assert_eq!(resolution.namespace, None);
        assert_eq!(
            resolution.namespaces.as_deref(),
            Some(&["team-a".to_string(), "team-b".to_string()][..])
        );
    }

    #[tokio::test]
    async fn forbidden_namespace() {
        let resolver = resolver(PermittedNamespaces::restricted(["team-a"]));
        let ctx = RequestContext::default();

        let arg = NamespaceArg::named("kube-system");
        let error = resolve(&resolver, &ctx, String::new(), arg, false)
            .await
            .unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::Forbidden)));
    }
}
