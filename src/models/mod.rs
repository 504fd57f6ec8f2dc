//! Data models
//!
//! Typed snapshots handed to callers, plus the resource kinds the executor
//! understands.

pub mod application;
pub mod installation;
pub mod resource_kind;

pub use application::{
    Application, ApplicationDestination, ApplicationSource, ArgoCdResource, HealthStatus,
    HealthStatusCode, OperationPhase, OperationState, SyncPolicy, SyncStatus, SyncStatusCode,
};
pub use installation::{DetectionMode, InstallationStatus};
pub use resource_kind::ResourceKind;
