//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Kubeconfig context to use when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_context: Option<String>,

    /// ArgoCD lookup settings
    #[serde(default)]
    pub argocd: ArgoCdConfig,

    /// Cooperating operator status artifact
    #[serde(default)]
    pub operator: OperatorConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Operation tracking
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// ArgoCD lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCdConfig {
    /// Namespace assumed when the CRD exists but no server workload is found
    #[serde(default = "default_argocd_namespace")]
    pub default_namespace: String,

    /// Namespaces probed for the server Deployment before a cluster-wide search
    #[serde(default = "default_candidate_namespaces")]
    pub candidate_namespaces: Vec<String>,

    /// Name of the ArgoCD API server Deployment
    #[serde(default = "default_server_deployment")]
    pub server_deployment: String,
}

/// Operator status ConfigMap location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    #[serde(default = "default_operator_namespace")]
    pub namespace: String,

    #[serde(default = "default_status_config_map")]
    pub status_config_map: String,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// How long an installation detection stays valid
    #[serde(default = "default_installation_ttl")]
    pub installation_ttl_seconds: u64,

    /// How long an application list stays valid
    #[serde(default = "default_application_ttl")]
    pub application_ttl_seconds: u64,
}

/// Operation tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,

    #[serde(default = "default_track_timeout")]
    pub timeout_seconds: u64,
}

impl CacheConfig {
    pub fn installation_ttl(&self) -> Duration {
        Duration::from_secs(self.installation_ttl_seconds)
    }

    pub fn application_ttl(&self) -> Duration {
        Duration::from_secs(self.application_ttl_seconds)
    }
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Default value functions
fn default_argocd_namespace() -> String {
    "argocd".to_string()
}

fn default_candidate_namespaces() -> Vec<String> {
    vec![
        "argocd".to_string(),
        "argo-cd".to_string(),
        "gitops".to_string(),
    ]
}

fn default_server_deployment() -> String {
    "argocd-server".to_string()
}

fn default_operator_namespace() -> String {
    "argo9s-system".to_string()
}

fn default_status_config_map() -> String {
    "argo9s-operator-status".to_string()
}

fn default_installation_ttl() -> u64 {
    300
}

fn default_application_ttl() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_track_timeout() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_context: None,
            argocd: ArgoCdConfig::default(),
            operator: OperatorConfig::default(),
            cache: CacheConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl Default for ArgoCdConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_argocd_namespace(),
            candidate_namespaces: default_candidate_namespaces(),
            server_deployment: default_server_deployment(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: default_operator_namespace(),
            status_config_map: default_status_config_map(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            installation_ttl_seconds: default_installation_ttl(),
            application_ttl_seconds: default_application_ttl(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_millis: default_poll_interval(),
            timeout_seconds: default_track_timeout(),
        }
    }
}
