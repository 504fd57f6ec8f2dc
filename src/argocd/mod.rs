//! ArgoCD engine
//!
//! - [`detector`]: is ArgoCD installed in a cluster, and where
//! - [`repository`]: cached and fresh Application reads
//! - [`parser`]: raw Application payloads to typed snapshots
//! - [`actions`]: sync and refresh requests
//! - [`tracker`]: waiting for requested operations to settle

pub mod actions;
pub mod detector;
pub mod parser;
pub mod repository;
pub mod tracker;

pub use actions::{ActionExecutor, ArgoOperation, RefreshType, SyncOptions};
pub use detector::{DetectorSettings, InstallationDetector};
pub use parser::{parse_application, parse_application_list};
pub use repository::ApplicationRepository;
pub use tracker::{OperationResult, OperationTracker, TrackOptions};
