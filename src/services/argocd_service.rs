//! Session-scoped ArgoCD service
//!
//! `ArgoCdService` wires one executor and one pair of caches into every engine
//! component. Create one per session and share it; there are no global caches.
//! This is the primary entry point for using argo9s as a library.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::argocd::{
    ActionExecutor, ApplicationRepository, DetectorSettings, InstallationDetector,
    OperationResult, OperationTracker, SyncOptions, TrackOptions,
};
use crate::cache::{CacheStats, Clock, SystemClock, TtlCache};
use crate::config::schema::Config;
use crate::error::{ArgoError, ArgoResult, ErrorKind};
use crate::executor::ClusterCommandExecutor;
use crate::models::{Application, InstallationStatus};

/// Entry counts of the service caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCacheStats {
    pub installations: CacheStats,
    pub applications: CacheStats,
}

/// ArgoCD engine for one session
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use argo9s::config::schema::Config;
/// use argo9s::kube::KubeExecutor;
/// use argo9s::services::ArgoCdService;
///
/// # async fn example() -> anyhow::Result<()> {
/// let service = ArgoCdService::new(Arc::new(KubeExecutor::new()), &Config::default());
///
/// let status = service.resolve("prod", false).await;
/// if status.installed {
///     for app in service.list_applications("prod", None, false).await {
///         println!("{}: {} / {}", app.name, app.sync_status.code, app.health_status.code);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArgoCdService {
    detector: InstallationDetector,
    repository: Arc<ApplicationRepository>,
    actions: ActionExecutor,
    tracker: OperationTracker,
    installation_cache: TtlCache<InstallationStatus>,
    application_cache: TtlCache<Vec<Application>>,
    track_defaults: TrackOptions,
}

impl ArgoCdService {
    pub fn new(executor: Arc<dyn ClusterCommandExecutor>, config: &Config) -> Self {
        Self::with_clock(executor, config, Arc::new(SystemClock))
    }

    /// Build a service whose caches read time from `clock`
    pub fn with_clock(
        executor: Arc<dyn ClusterCommandExecutor>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let installation_cache = TtlCache::with_clock(Arc::clone(&clock));
        let application_cache = TtlCache::with_clock(clock);
        let track_defaults = TrackOptions::from(&config.tracking);

        let detector = InstallationDetector::new(
            Arc::clone(&executor),
            installation_cache.clone(),
            DetectorSettings::from(config),
        );
        let repository = Arc::new(ApplicationRepository::new(
            Arc::clone(&executor),
            application_cache.clone(),
            config.cache.application_ttl(),
        ));
        let actions = ActionExecutor::new(executor);
        let tracker = OperationTracker::new(Arc::clone(&repository), track_defaults);

        Self {
            detector,
            repository,
            actions,
            tracker,
            installation_cache,
            application_cache,
            track_defaults,
        }
    }

    pub fn detector(&self) -> &InstallationDetector {
        &self.detector
    }

    pub fn repository(&self) -> &ApplicationRepository {
        &self.repository
    }

    pub fn actions(&self) -> &ActionExecutor {
        &self.actions
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// Tracking options from configuration
    pub fn track_defaults(&self) -> TrackOptions {
        self.track_defaults
    }

    pub async fn resolve(&self, context: &str, bypass_cache: bool) -> InstallationStatus {
        self.detector.resolve(context, bypass_cache).await
    }

    /// Resolve several contexts concurrently, keeping input order
    pub async fn resolve_many(&self, contexts: &[String]) -> Vec<(String, InstallationStatus)> {
        let statuses = join_all(
            contexts
                .iter()
                .map(|context| self.detector.resolve(context, false)),
        )
        .await;
        contexts.iter().cloned().zip(statuses).collect()
    }

    /// List applications, in the installation namespace unless one is given
    ///
    /// Empty when ArgoCD is not installed in `context`.
    pub async fn list_applications(
        &self,
        context: &str,
        namespace: Option<&str>,
        bypass_cache: bool,
    ) -> Vec<Application> {
        match self.target_namespace(context, namespace).await {
            Ok(namespace) => self.repository.list(context, &namespace, bypass_cache).await,
            Err(e) => {
                tracing::warn!(context, error = %e, "Skipping application list");
                Vec::new()
            }
        }
    }

    /// Fetch one application fresh
    pub async fn get_application(
        &self,
        context: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> ArgoResult<Application> {
        let namespace = self.target_namespace(context, namespace).await?;
        self.repository.get(context, name, &namespace).await
    }

    /// Request a sync and wait for its outcome
    ///
    /// The application is re-read first so the operation it was already
    /// running (if any) cannot be mistaken for the outcome of this sync.
    pub async fn sync_and_track(
        &self,
        context: &str,
        app: &Application,
        sync: &SyncOptions,
        track: TrackOptions,
        cancel: CancellationToken,
    ) -> ArgoResult<OperationResult> {
        let current = self.repository.get(context, &app.name, &app.namespace).await?;
        let started_after = current
            .last_operation
            .as_ref()
            .and_then(|op| op.started_at);

        self.actions.sync_with(context, &current, sync).await?;

        let options = TrackOptions {
            started_after,
            ..track
        };
        self.tracker
            .track_with(context, &current, options, cancel)
            .await
    }

    /// Drop every cached entry of a context
    pub fn invalidate_context(&self, context: &str) {
        self.detector.invalidate(context);
        let dropped = self.repository.invalidate_context(context);
        tracing::debug!(context, dropped, "Invalidated context caches");
    }

    pub fn cache_stats(&self) -> ServiceCacheStats {
        ServiceCacheStats {
            installations: self.installation_cache.stats(),
            applications: self.application_cache.stats(),
        }
    }

    async fn target_namespace(&self, context: &str, namespace: Option<&str>) -> ArgoResult<String> {
        if let Some(namespace) = namespace {
            return Ok(namespace.to_string());
        }

        let status = self.detector.resolve(context, false).await;
        match status.namespace {
            Some(namespace) if status.installed => Ok(namespace),
            _ => Err(ArgoError::new(
                ErrorKind::NotFound,
                format!("ArgoCD is not installed in context '{}'", context),
            )),
        }
    }
}
