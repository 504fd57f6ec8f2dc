//! ArgoCD installation detection
//!
//! Resolution runs in tiers and stops at the first one that produces an
//! answer:
//!
//! 1. **Operated** - a cooperating operator publishes a status ConfigMap
//!    describing the ArgoCD installation. Authoritative when present.
//! 2. **Basic** - probe for the `applications.argoproj.io` CRD, then locate
//!    the `argocd-server` Deployment to learn namespace and version.
//! 3. **Absent** - nothing found, `installed: false`.
//!
//! Probe failures never abort resolution; each is classified, logged and
//! treated as "nothing found at this tier". When a tier 2 probe fails with a
//! transient (network or timeout) error the outcome is not trusted: the last
//! known status is served instead and the cache is left untouched.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{TtlCache, installation_key};
use crate::config::Config;
use crate::error::{ArgoError, ErrorKind};
use crate::executor::{ClusterCommandExecutor, list_items};
use crate::models::{DetectionMode, InstallationStatus, ResourceKind};

/// CRD whose presence means ArgoCD is, or was, installed
pub const APPLICATION_CRD: &str = "applications.argoproj.io";

/// Detection settings, usually derived from [`Config`]
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub operator_namespace: String,
    pub status_config_map: String,
    pub candidate_namespaces: Vec<String>,
    pub server_deployment: String,
    pub fallback_namespace: String,
    pub ttl: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DetectorSettings {
    fn from(config: &Config) -> Self {
        Self {
            operator_namespace: config.operator.namespace.clone(),
            status_config_map: config.operator.status_config_map.clone(),
            candidate_namespaces: config.argocd.candidate_namespaces.clone(),
            server_deployment: config.argocd.server_deployment.clone(),
            fallback_namespace: config.argocd.default_namespace.clone(),
            ttl: config.cache.installation_ttl(),
        }
    }
}

/// `data.status` of the operator status ConfigMap
#[derive(Debug, Deserialize)]
struct OperatorStatus {
    argocd: Option<OperatorArgoCdStatus>,
}

#[derive(Debug, Deserialize)]
struct OperatorArgoCdStatus {
    #[serde(default)]
    installed: bool,
    namespace: Option<String>,
    version: Option<String>,
}

/// Transient probe failures seen during one detection run
#[derive(Debug, Default)]
struct ProbeTrail {
    interrupted: bool,
}

/// Resolves and caches ArgoCD installation status per cluster context
pub struct InstallationDetector {
    executor: Arc<dyn ClusterCommandExecutor>,
    cache: TtlCache<InstallationStatus>,
    settings: DetectorSettings,
}

impl InstallationDetector {
    pub fn new(
        executor: Arc<dyn ClusterCommandExecutor>,
        cache: TtlCache<InstallationStatus>,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            executor,
            cache,
            settings,
        }
    }

    /// Is ArgoCD installed in `context`, and where
    ///
    /// Cached per context; `bypass_cache` forces re-detection and overwrites
    /// the cached entry.
    pub async fn resolve(&self, context: &str, bypass_cache: bool) -> InstallationStatus {
        let key = installation_key(context);
        if !bypass_cache {
            if let Some(status) = self.cache.get(&key) {
                tracing::debug!(context, "Installation status served from cache");
                return status;
            }
        }

        let mut trail = ProbeTrail::default();
        let status = self.detect(context, &mut trail).await;
        if trail.interrupted {
            if let Some(previous) = self.cache.get_stale(&key) {
                tracing::warn!(
                    context,
                    installed = previous.installed,
                    "Detection interrupted by transient errors, keeping last known status"
                );
                return previous;
            }
            tracing::warn!(
                context,
                installed = status.installed,
                "Detection interrupted by transient errors, result not cached"
            );
            return status;
        }

        tracing::info!(
            context,
            installed = status.installed,
            namespace = status.namespace.as_deref().unwrap_or("-"),
            version = status.version.as_deref().unwrap_or("-"),
            mode = %status.mode,
            "Resolved ArgoCD installation"
        );

        self.cache.insert(key, status.clone(), self.settings.ttl);
        status
    }

    /// Forget the cached status for a context
    pub fn invalidate(&self, context: &str) {
        self.cache.invalidate(&installation_key(context));
    }

    async fn detect(&self, context: &str, trail: &mut ProbeTrail) -> InstallationStatus {
        if let Some(status) = self.detect_operated(context).await {
            return status;
        }
        if let Some(status) = self.detect_direct(context, trail).await {
            return status;
        }
        InstallationStatus::not_installed(DetectionMode::Basic)
    }

    /// Tier 1: read the operator status ConfigMap
    async fn detect_operated(&self, context: &str) -> Option<InstallationStatus> {
        let payload = self
            .query(
                context,
                "operator status",
                ResourceKind::ConfigMap,
                Some(&self.settings.operator_namespace),
                Some(&self.settings.status_config_map),
                &mut ProbeTrail::default(),
            )
            .await?;

        let raw = payload
            .get("data")
            .and_then(|d| d.get("status"))
            .and_then(|s| s.as_str())?;

        let report: OperatorStatus = match serde_json::from_str(raw) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(context, error = %e, "Operator status is not valid JSON, ignoring");
                return None;
            }
        };

        let argocd = report.argocd?;
        if !argocd.installed {
            return Some(InstallationStatus::not_installed(DetectionMode::Operated));
        }

        // An operator that says "installed" without a namespace is not usable
        let namespace = argocd.namespace.filter(|ns| !ns.is_empty())?;
        Some(InstallationStatus::installed(
            namespace,
            argocd.version,
            DetectionMode::Operated,
        ))
    }

    /// Tier 2: probe the CRD and locate the server workload
    async fn detect_direct(
        &self,
        context: &str,
        trail: &mut ProbeTrail,
    ) -> Option<InstallationStatus> {
        self.query(
            context,
            "application CRD",
            ResourceKind::CustomResourceDefinition,
            None,
            Some(APPLICATION_CRD),
            trail,
        )
        .await?;

        match self.find_server_deployment(context, trail).await {
            Some(deployment) => {
                let namespace = deployment
                    .get("metadata")
                    .and_then(|m| m.get("namespace"))
                    .and_then(|n| n.as_str())
                    .unwrap_or(&self.settings.fallback_namespace)
                    .to_string();
                Some(InstallationStatus::installed(
                    namespace,
                    deployment_version(&deployment),
                    DetectionMode::Basic,
                ))
            }
            None => {
                tracing::warn!(
                    context,
                    namespace = %self.settings.fallback_namespace,
                    "Application CRD present but no ArgoCD server found, assuming default namespace"
                );
                Some(InstallationStatus::installed(
                    self.settings.fallback_namespace.clone(),
                    None,
                    DetectionMode::Basic,
                ))
            }
        }
    }

    async fn find_server_deployment(&self, context: &str, trail: &mut ProbeTrail) -> Option<Value> {
        for namespace in &self.settings.candidate_namespaces {
            if let Some(deployment) = self
                .query(
                    context,
                    "server deployment",
                    ResourceKind::Deployment,
                    Some(namespace),
                    Some(&self.settings.server_deployment),
                    trail,
                )
                .await
            {
                return Some(deployment);
            }
        }

        let all = self
            .query(context, "deployments", ResourceKind::Deployment, None, None, trail)
            .await?;
        list_items(&all)
            .iter()
            .find(|d| is_server_deployment(d, &self.settings.server_deployment))
            .cloned()
    }

    /// Run a probe query, logging and swallowing any failure
    ///
    /// Transient failures are recorded in `trail`.
    async fn query(
        &self,
        context: &str,
        probe: &str,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: Option<&str>,
        trail: &mut ProbeTrail,
    ) -> Option<Value> {
        match self
            .executor
            .query_resource(context, kind, namespace, name)
            .await
        {
            Ok(payload) => Some(payload),
            Err(e) => {
                let err = ArgoError::from_raw(&e);
                if err.kind() == ErrorKind::NotFound {
                    tracing::debug!(context, probe, "Probe found nothing");
                } else {
                    tracing::warn!(context, probe, kind = %err.kind(), error = %err, "Probe failed");
                }
                trail.interrupted |= err.kind().allows_cached_fallback();
                None
            }
        }
    }
}

fn is_server_deployment(deployment: &Value, server_name: &str) -> bool {
    let metadata = deployment.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str());
    let label = metadata
        .and_then(|m| m.get("labels"))
        .and_then(|l| l.get("app.kubernetes.io/name"))
        .and_then(|n| n.as_str());

    name == Some(server_name) || label == Some(server_name)
}

/// Version from the server image tag, else the `app.kubernetes.io/version` label
fn deployment_version(deployment: &Value) -> Option<String> {
    let containers = deployment
        .get("spec")
        .and_then(|s| s.get("template"))
        .and_then(|t| t.get("spec"))
        .and_then(|s| s.get("containers"))
        .and_then(|c| c.as_array());

    let images: Vec<&str> = containers
        .map(|cs| {
            cs.iter()
                .filter_map(|c| c.get("image").and_then(|i| i.as_str()))
                .collect()
        })
        .unwrap_or_default();

    images
        .iter()
        .find(|image| image.contains("argocd"))
        .or_else(|| images.first())
        .and_then(|image| image_tag(image))
        .or_else(|| {
            deployment
                .get("metadata")
                .and_then(|m| m.get("labels"))
                .and_then(|l| l.get("app.kubernetes.io/version"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
}

/// Tag part of an image reference
///
/// Handles registry ports (`host:5000/repo`) and digests (`repo:tag@sha256:..`,
/// `repo@sha256:..`). `latest` carries no version information.
pub fn image_tag(image: &str) -> Option<String> {
    let without_digest = image.split('@').next().unwrap_or(image);
    let last_segment = without_digest.rsplit('/').next().unwrap_or(without_digest);
    let (_, tag) = last_segment.split_once(':')?;

    if tag.is_empty() || tag == "latest" {
        None
    } else {
        Some(tag.to_string())
    }
}
