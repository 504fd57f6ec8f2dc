//! Kubernetes client module
//!
//! Builds clients for named kubeconfig contexts and provides the kube-rs
//! backed [`KubeExecutor`].
//!
//! Clusters whose API server lives on an internal host (private IPs, `.local`,
//! `.internal`, corporate `corp`/`int` domains) bypass any proxy configured
//! in the kubeconfig, which is what corporate setups expect.

mod executor;

pub use executor::KubeExecutor;

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use url::Url;

/// Create a client for `context`, or for the current context when `None`
///
/// With no context the default inference order applies: in-cluster config,
/// then `KUBECONFIG`, then `~/.kube/config`.
pub async fn create_client_for_context(context: Option<&str>) -> Result<Client> {
    let mut config = match context {
        Some(name) => {
            let options = KubeConfigOptions {
                context: Some(name.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context '{}'", name))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    bypass_proxy_for_internal_hosts(&mut config);

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Drop the configured proxy when the API server is an internal host
fn bypass_proxy_for_internal_hosts(config: &mut Config) {
    if config.proxy_url.is_none() {
        return;
    }

    let cluster_url = config.cluster_url.to_string();
    let host = match Url::parse(&cluster_url) {
        Ok(url) => url.host_str().map(str::to_string),
        Err(_) => None,
    };

    if let Some(host) = host {
        if is_internal_host(&host) {
            tracing::debug!(host = %host, "Bypassing proxy for internal cluster host");
            config.proxy_url = None;
        }
    }
}

/// Check if a host looks like an internal/private domain
fn is_internal_host(host: &str) -> bool {
    if host == "localhost" || host == "::1" || host.starts_with("127.") {
        return true;
    }

    if let Ok(ip) = host.parse::<std::net::Ipv4Addr>() {
        return ip.is_private() || ip.is_loopback() || ip.is_link_local();
    }

    const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".cluster.local", ".localhost"];
    if INTERNAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return true;
    }

    // *.corp.<tld>, *.int.<tld>
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() >= 2 && matches!(parts[parts.len() - 2], "corp" | "internal" | "int")
}

/// Get the current kubeconfig context name
pub fn current_context() -> Result<String> {
    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
    kubeconfig
        .current_context
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow::anyhow!("kubeconfig has no current-context set"))
}

/// List every context name in the kubeconfig
pub fn list_contexts() -> Result<Vec<String>> {
    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
    Ok(kubeconfig
        .contexts
        .into_iter()
        .map(|named| named.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal_host_private_ips() {
        assert!(is_internal_host("10.0.0.1"));
        assert!(is_internal_host("172.16.0.1"));
        assert!(is_internal_host("192.168.1.1"));
        assert!(is_internal_host("localhost"));
        assert!(is_internal_host("127.0.0.1"));
        assert!(!is_internal_host("172.32.0.1"));
        assert!(!is_internal_host("8.8.8.8"));
    }

    #[test]
    fn test_is_internal_host_domains() {
        assert!(is_internal_host("api.cluster.local"));
        assert!(is_internal_host("k8s.platform.internal"));
        assert!(is_internal_host("api.example.corp"));
        assert!(!is_internal_host("example.com"));
        assert!(!is_internal_host("abc123.gr7.eu-west-1.eks.amazonaws.com"));
    }
}
