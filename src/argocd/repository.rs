//! Application queries
//!
//! `list` is a cached bulk read that never fails; `get` is a fresh targeted
//! read that surfaces classified errors.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{TtlCache, applications_key, applications_prefix};
use crate::error::{ArgoError, ArgoResult};
use crate::executor::ClusterCommandExecutor;
use crate::models::{Application, ResourceKind};

use super::parser::{parse_application, parse_application_list};

/// Default lifetime of a cached application list
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(30);

pub struct ApplicationRepository {
    executor: Arc<dyn ClusterCommandExecutor>,
    cache: TtlCache<Vec<Application>>,
    ttl: Duration,
}

impl ApplicationRepository {
    pub fn new(
        executor: Arc<dyn ClusterCommandExecutor>,
        cache: TtlCache<Vec<Application>>,
        ttl: Duration,
    ) -> Self {
        Self {
            executor,
            cache,
            ttl,
        }
    }

    /// All applications in `namespace`
    ///
    /// On failure degrades instead of erroring: transient failures serve the
    /// last list fetched for this scope if there is one, everything else
    /// yields an empty list.
    pub async fn list(
        &self,
        context: &str,
        namespace: &str,
        bypass_cache: bool,
    ) -> Vec<Application> {
        let key = applications_key(context, namespace);
        if !bypass_cache {
            if let Some(apps) = self.cache.get(&key) {
                tracing::debug!(context, namespace, count = apps.len(), "Application list cache hit");
                return apps;
            }
        }

        tracing::debug!(context, namespace, "Fetching application list");
        match self
            .executor
            .query_resource(context, ResourceKind::Application, Some(namespace), None)
            .await
        {
            Ok(payload) => {
                let apps = parse_application_list(&payload);
                self.cache.insert(key, apps.clone(), self.ttl);
                apps
            }
            Err(e) => {
                let err = ArgoError::from_raw(&e);
                let kind = err.kind();
                let fallback = if kind.allows_cached_fallback() {
                    self.cache.get_stale(&key)
                } else {
                    None
                };

                tracing::warn!(
                    context,
                    namespace,
                    %kind,
                    error = %err,
                    stale = fallback.is_some(),
                    "Failed to list applications"
                );
                fallback.unwrap_or_default()
            }
        }
    }

    /// One application, always fetched fresh
    pub async fn get(&self, context: &str, name: &str, namespace: &str) -> ArgoResult<Application> {
        let payload = self
            .executor
            .query_resource(
                context,
                ResourceKind::Application,
                Some(namespace),
                Some(name),
            )
            .await
            .map_err(|e| ArgoError::from_raw(&e))?;

        Ok(parse_application(&payload))
    }

    /// Drop the cached list for one scope
    pub fn invalidate(&self, context: &str, namespace: &str) {
        if self.cache.invalidate(&applications_key(context, namespace)) {
            tracing::debug!(context, namespace, "Invalidated application list");
        }
    }

    /// Drop every cached list of a context
    pub fn invalidate_context(&self, context: &str) -> usize {
        self.cache.invalidate_prefix(&applications_prefix(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::ErrorKind;
    use crate::executor::MockClusterCommandExecutor;
    use serde_json::json;

    fn app_list() -> serde_json::Value {
        json!({"items": [
            {"metadata": {"name": "guestbook", "namespace": "argocd"},
             "status": {"sync": {"status": "Synced"}, "health": {"status": "Healthy"}}}
        ]})
    }

    #[tokio::test]
    async fn test_list_is_cached_per_scope() {
        let mut mock = MockClusterCommandExecutor::new();
        mock.expect_query_resource()
            .withf(|_, _, ns, _| *ns == Some("argocd"))
            .times(1)
            .returning(|_, _, _, _| Ok(app_list()));
        mock.expect_query_resource()
            .withf(|_, _, ns, _| *ns == Some("team-a"))
            .times(1)
            .returning(|_, _, _, _| Ok(json!({"items": []})));

        let repo = ApplicationRepository::new(Arc::new(mock), TtlCache::new(), DEFAULT_LIST_TTL);
        assert_eq!(repo.list("prod", "argocd", false).await.len(), 1);
        assert_eq!(repo.list("prod", "argocd", false).await.len(), 1);
        assert!(repo.list("prod", "team-a", false).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_serves_stale_on_network_error() {
        let clock = ManualClock::new();
        let mut mock = MockClusterCommandExecutor::new();
        let mut calls = 0;
        mock.expect_query_resource()
            .times(2)
            .returning(move |_, _, _, _| {
                calls += 1;
                if calls == 1 {
                    Ok(app_list())
                } else {
                    Err(anyhow::anyhow!("connection refused"))
                }
            });

        let repo = ApplicationRepository::new(
            Arc::new(mock),
            TtlCache::with_clock(Arc::new(clock.clone())),
            DEFAULT_LIST_TTL,
        );
        assert_eq!(repo.list("prod", "argocd", false).await.len(), 1);

        clock.advance(Duration::from_secs(31));
        let apps = repo.list("prod", "argocd", false).await;
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "guestbook");
    }

    #[tokio::test]
    async fn test_list_forbidden_is_empty() {
        let mut mock = MockClusterCommandExecutor::new();
        mock.expect_query_resource().returning(|_, _, _, _| {
            Err(anyhow::anyhow!(
                "applications.argoproj.io is forbidden: User \"dev\" cannot list resource"
            ))
        });

        let repo = ApplicationRepository::new(Arc::new(mock), TtlCache::new(), DEFAULT_LIST_TTL);
        assert!(repo.list("prod", "argocd", false).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_propagates_classified_error() {
        let mut mock = MockClusterCommandExecutor::new();
        mock.expect_query_resource()
            .withf(|_, kind, _, name| *kind == ResourceKind::Application && *name == Some("gone"))
            .returning(|_, _, _, _| {
                Err(anyhow::anyhow!("applications.argoproj.io \"gone\" not found"))
            });

        let repo = ApplicationRepository::new(Arc::new(mock), TtlCache::new(), DEFAULT_LIST_TTL);
        let err = repo.get("prod", "gone", "argocd").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
