//! Mutating actions on Applications
//!
//! Every action is one JSON merge patch on the Application resource. The
//! controller watches the refresh annotation and the `operation` field and
//! does the actual work asynchronously; use the
//! [`OperationTracker`](super::tracker::OperationTracker) to wait for it.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::{ArgoError, ArgoResult};
use crate::executor::ClusterCommandExecutor;
use crate::models::{Application, ResourceKind};

/// Annotation the application controller watches for refresh requests
pub const REFRESH_ANNOTATION: &str = "argocd.argoproj.io/refresh";

/// Recorded as `operation.initiatedBy.username` on syncs
pub const INITIATOR: &str = "argo9s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshType {
    /// Re-compare against the cached manifests
    Normal,
    /// Regenerate manifests, bypassing the repo-server cache
    Hard,
}

impl RefreshType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshType::Normal => "normal",
            RefreshType::Hard => "hard",
        }
    }
}

/// Knobs for a sync request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Revision to sync to, the application's target revision when `None`
    pub revision: Option<String>,
    /// Delete resources no longer in the source
    pub prune: bool,
    pub dry_run: bool,
}

/// An action expressible as a single merge patch
pub trait ArgoOperation: Send + Sync {
    /// Human-readable name, used in logs
    fn name(&self) -> &'static str;

    /// Merge patch to apply to `app`
    fn patch(&self, app: &Application) -> Value;
}

/// Request a sync
pub struct SyncOperation {
    options: SyncOptions,
}

impl SyncOperation {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }
}

impl ArgoOperation for SyncOperation {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn patch(&self, _app: &Application) -> Value {
        let mut sync = Map::new();
        if let Some(revision) = &self.options.revision {
            sync.insert("revision".to_string(), json!(revision));
        }
        sync.insert("prune".to_string(), json!(self.options.prune));
        sync.insert("dryRun".to_string(), json!(self.options.dry_run));

        let mut patch = refresh_patch(RefreshType::Normal);
        patch["operation"] = json!({
            "initiatedBy": { "username": INITIATOR },
            "sync": Value::Object(sync),
        });
        patch
    }
}

/// Request a refresh
pub struct RefreshOperation {
    refresh: RefreshType,
}

impl RefreshOperation {
    pub fn new(refresh: RefreshType) -> Self {
        Self { refresh }
    }
}

impl ArgoOperation for RefreshOperation {
    fn name(&self) -> &'static str {
        match self.refresh {
            RefreshType::Normal => "refresh",
            RefreshType::Hard => "hard-refresh",
        }
    }

    fn patch(&self, _app: &Application) -> Value {
        refresh_patch(self.refresh)
    }
}

fn refresh_patch(refresh: RefreshType) -> Value {
    json!({
        "metadata": {
            "annotations": {
                REFRESH_ANNOTATION: refresh.as_str()
            }
        }
    })
}

/// Issues action patches through the cluster executor
///
/// No retries: a failed patch comes back as a classified error and the caller
/// decides.
pub struct ActionExecutor {
    executor: Arc<dyn ClusterCommandExecutor>,
}

impl ActionExecutor {
    pub fn new(executor: Arc<dyn ClusterCommandExecutor>) -> Self {
        Self { executor }
    }

    /// Sync to the application's target revision
    pub async fn sync(&self, context: &str, app: &Application) -> ArgoResult<()> {
        self.sync_with(context, app, &SyncOptions::default()).await
    }

    pub async fn sync_with(
        &self,
        context: &str,
        app: &Application,
        options: &SyncOptions,
    ) -> ArgoResult<()> {
        if app.is_operation_running() {
            tracing::warn!(
                context,
                app = %app.qualified_name(),
                "An operation is already running, the new sync request replaces it"
            );
        }
        self.execute(context, app, &SyncOperation::new(options.clone()))
            .await
    }

    pub async fn refresh(&self, context: &str, app: &Application) -> ArgoResult<()> {
        self.execute(context, app, &RefreshOperation::new(RefreshType::Normal))
            .await
    }

    pub async fn hard_refresh(&self, context: &str, app: &Application) -> ArgoResult<()> {
        self.execute(context, app, &RefreshOperation::new(RefreshType::Hard))
            .await
    }

    /// Apply an operation's patch, returning once the API server accepts it
    pub async fn execute(
        &self,
        context: &str,
        app: &Application,
        operation: &dyn ArgoOperation,
    ) -> ArgoResult<()> {
        tracing::debug!(
            context,
            operation = operation.name(),
            app = %app.qualified_name(),
            "Patching application"
        );

        self.executor
            .patch_resource(
                context,
                ResourceKind::Application,
                &app.name,
                &app.namespace,
                operation.patch(app),
            )
            .await
            .map_err(|e| ArgoError::from_raw(&e))?;

        tracing::info!(
            context,
            operation = operation.name(),
            app = %app.qualified_name(),
            "Operation requested"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::executor::MockClusterCommandExecutor;

    fn guestbook() -> Application {
        Application {
            name: "guestbook".to_string(),
            namespace: "argocd".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_refresh_patches() {
        let app = guestbook();
        let normal = RefreshOperation::new(RefreshType::Normal).patch(&app);
        assert_eq!(normal["metadata"]["annotations"][REFRESH_ANNOTATION], "normal");
        assert!(normal.get("operation").is_none());

        let hard = RefreshOperation::new(RefreshType::Hard).patch(&app);
        assert_eq!(hard["metadata"]["annotations"][REFRESH_ANNOTATION], "hard");
    }

    #[test]
    fn test_sync_patch_carries_operation() {
        let app = guestbook();
        let patch = SyncOperation::new(SyncOptions::default()).patch(&app);
        assert_eq!(patch["metadata"]["annotations"][REFRESH_ANNOTATION], "normal");
        assert_eq!(patch["operation"]["initiatedBy"]["username"], INITIATOR);
        assert_eq!(patch["operation"]["sync"]["prune"], false);
        assert_eq!(patch["operation"]["sync"]["dryRun"], false);
        // Unset revision defers to the application's targetRevision
        assert!(patch["operation"]["sync"].get("revision").is_none());

        let options = SyncOptions {
            revision: Some("v1.2.0".to_string()),
            prune: true,
            dry_run: true,
        };
        let patch = SyncOperation::new(options).patch(&app);
        assert_eq!(patch["operation"]["sync"]["revision"], "v1.2.0");
        assert_eq!(patch["operation"]["sync"]["prune"], true);
        assert_eq!(patch["operation"]["sync"]["dryRun"], true);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(SyncOperation::new(SyncOptions::default()).name(), "sync");
        assert_eq!(RefreshOperation::new(RefreshType::Normal).name(), "refresh");
        assert_eq!(RefreshOperation::new(RefreshType::Hard).name(), "hard-refresh");
    }

    #[tokio::test]
    async fn test_hard_refresh_issues_one_patch() {
        let mut mock = MockClusterCommandExecutor::new();
        mock.expect_patch_resource()
            .withf(|ctx, kind, name, ns, patch| {
                ctx == "prod"
                    && *kind == ResourceKind::Application
                    && name == "guestbook"
                    && ns == "argocd"
                    && patch["metadata"]["annotations"][REFRESH_ANNOTATION] == "hard"
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let actions = ActionExecutor::new(Arc::new(mock));
        actions.hard_refresh("prod", &guestbook()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_patch_is_classified() {
        let mut mock = MockClusterCommandExecutor::new();
        mock.expect_patch_resource()
            .times(1)
            .returning(|_, _, _, _, _| {
                Err(anyhow::anyhow!(
                    "applications.argoproj.io \"guestbook\" is forbidden: User \"viewer\" cannot patch resource"
                ))
            });

        let actions = ActionExecutor::new(Arc::new(mock));
        let err = actions.sync("prod", &guestbook()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }
}
