//! Resource kinds the engine queries or patches
//!
//! Centralizes group/version/plural information so executors do not scatter
//! API coordinates through the codebase.

use std::fmt;

/// Kubernetes resource kinds used by ArgoCD detection and operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `argoproj.io/v1alpha1` Application
    Application,
    /// `apiextensions.k8s.io/v1` CustomResourceDefinition (cluster scoped)
    CustomResourceDefinition,
    /// `apps/v1` Deployment
    Deployment,
    /// `v1` ConfigMap
    ConfigMap,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "Application",
            ResourceKind::CustomResourceDefinition => "CustomResourceDefinition",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::ConfigMap => "ConfigMap",
        }
    }

    /// API group, empty for the core group
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::Application => "argoproj.io",
            ResourceKind::CustomResourceDefinition => "apiextensions.k8s.io",
            ResourceKind::Deployment => "apps",
            ResourceKind::ConfigMap => "",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            ResourceKind::Application => "v1alpha1",
            ResourceKind::CustomResourceDefinition => "v1",
            ResourceKind::Deployment => "v1",
            ResourceKind::ConfigMap => "v1",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Application => "applications",
            ResourceKind::CustomResourceDefinition => "customresourcedefinitions",
            ResourceKind::Deployment => "deployments",
            ResourceKind::ConfigMap => "configmaps",
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group().is_empty() {
            self.version().to_string()
        } else {
            format!("{}/{}", self.group(), self.version())
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::CustomResourceDefinition)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
