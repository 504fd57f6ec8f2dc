//! argo9s library
//!
//! ArgoCD detection, query and sync-tracking engine. The [`services`] module
//! is the usual entry point; the engine components in [`argocd`] can also be
//! wired individually around any [`executor::ClusterCommandExecutor`].

pub mod argocd;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod kube;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use argocd::{OperationResult, SyncOptions, TrackOptions};
pub use error::{ArgoError, ArgoResult, ErrorKind};
pub use executor::ClusterCommandExecutor;
pub use models::{Application, InstallationStatus};
pub use services::ArgoCdService;
