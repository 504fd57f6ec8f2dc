//! Typed ArgoCD Application snapshot
//!
//! These types are what the rest of the crate and any presentation layer see.
//! They are produced only by [`crate::argocd::parser`]; every status code is a
//! closed set with an `Unknown` fallback so schema drift upstream never leaks
//! raw strings into matches downstream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Whether live state matches the desired source state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SyncStatusCode {
    Synced,
    OutOfSync,
    #[default]
    Unknown,
}

impl SyncStatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatusCode::Synced => "Synced",
            SyncStatusCode::OutOfSync => "OutOfSync",
            SyncStatusCode::Unknown => "Unknown",
        }
    }

    /// Map an upstream value, `None` when it is not one of the known codes
    pub fn parse_optional(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "synced" => Some(SyncStatusCode::Synced),
            "outofsync" => Some(SyncStatusCode::OutOfSync),
            "unknown" => Some(SyncStatusCode::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Controller's assessment of runtime health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum HealthStatusCode {
    Healthy,
    Progressing,
    Degraded,
    Suspended,
    Missing,
    #[default]
    Unknown,
}

impl HealthStatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatusCode::Healthy => "Healthy",
            HealthStatusCode::Progressing => "Progressing",
            HealthStatusCode::Degraded => "Degraded",
            HealthStatusCode::Suspended => "Suspended",
            HealthStatusCode::Missing => "Missing",
            HealthStatusCode::Unknown => "Unknown",
        }
    }

    /// Map an upstream value, `None` when it is not one of the known codes
    pub fn parse_optional(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "healthy" => Some(HealthStatusCode::Healthy),
            "progressing" => Some(HealthStatusCode::Progressing),
            "degraded" => Some(HealthStatusCode::Degraded),
            "suspended" => Some(HealthStatusCode::Suspended),
            "missing" => Some(HealthStatusCode::Missing),
            "unknown" => Some(HealthStatusCode::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for HealthStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Lifecycle phase of a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationPhase {
    Running,
    Terminating,
    Succeeded,
    Failed,
    Error,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Running => "Running",
            OperationPhase::Terminating => "Terminating",
            OperationPhase::Succeeded => "Succeeded",
            OperationPhase::Failed => "Failed",
            OperationPhase::Error => "Error",
        }
    }

    pub fn parse_optional(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(OperationPhase::Running),
            "terminating" => Some(OperationPhase::Terminating),
            "succeeded" => Some(OperationPhase::Succeeded),
            "failed" => Some(OperationPhase::Failed),
            "error" => Some(OperationPhase::Error),
            _ => None,
        }
    }

    /// Succeeded, Failed and Error are final
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationPhase::Succeeded | OperationPhase::Failed | OperationPhase::Error
        )
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where the desired state comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    pub repo_url: String,
    pub path: String,
    pub target_revision: String,
}

/// Where the desired state is deployed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    pub server: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    pub code: SyncStatusCode,
    pub revision: Option<String>,
    /// Set when upstream reported a value outside the known codes
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthStatus {
    pub code: HealthStatusCode,
    pub message: Option<String>,
}

/// Automated sync settings from `spec.syncPolicy`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    pub automated: bool,
    pub prune: bool,
    pub self_heal: bool,
}

/// Sync and health of one managed object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCdResource {
    pub group: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub sync_status: SyncStatusCode,
    pub health_status: HealthStatusCode,
    pub message: Option<String>,
}

impl ArgoCdResource {
    pub fn is_drifted(&self) -> bool {
        self.sync_status == SyncStatusCode::OutOfSync
    }
}

/// Last or current operation on an Application
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    /// `None` when the controller reported a phase this crate does not know
    pub phase: Option<OperationPhase>,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Revision the sync applied, from `syncResult.revision`
    pub sync_revision: Option<String>,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_some_and(|phase| phase.is_terminal())
    }
}

/// One GitOps-managed workload set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub namespace: String,
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    pub sync_policy: SyncPolicy,
    pub sync_status: SyncStatus,
    pub health_status: HealthStatus,
    pub resources: Vec<ArgoCdResource>,
    pub last_operation: Option<OperationState>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Application {
    /// Managed resources whose live state differs from the source
    pub fn drifted_resources(&self) -> impl Iterator<Item = &ArgoCdResource> {
        self.resources.iter().filter(|r| r.is_drifted())
    }

    /// Whether the controller is still working on the last operation
    pub fn is_operation_running(&self) -> bool {
        self.last_operation
            .as_ref()
            .is_some_and(|op| !op.is_terminal() && op.phase.is_some())
    }

    /// `namespace/name`
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
