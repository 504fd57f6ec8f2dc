//! ArgoCD installation status

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// How the installation was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectionMode {
    /// Reported by a cooperating operator's status ConfigMap
    Operated,
    /// Probed directly from CRDs and workloads
    Basic,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Operated => write!(f, "operated"),
            DetectionMode::Basic => write!(f, "basic"),
        }
    }
}

/// Result of resolving whether ArgoCD runs in a cluster
///
/// Construct through [`InstallationStatus::installed`] or
/// [`InstallationStatus::not_installed`]; a missing installation never carries
/// a namespace or version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    pub installed: bool,
    pub namespace: Option<String>,
    pub version: Option<String>,
    pub mode: DetectionMode,
    pub detected_at: DateTime<Utc>,
}

impl InstallationStatus {
    pub fn installed(namespace: String, version: Option<String>, mode: DetectionMode) -> Self {
        Self {
            installed: true,
            namespace: Some(namespace),
            version,
            mode,
            detected_at: Utc::now(),
        }
    }

    pub fn not_installed(mode: DetectionMode) -> Self {
        Self {
            installed: false,
            namespace: None,
            version: None,
            mode,
            detected_at: Utc::now(),
        }
    }
}
