//! kube-rs backed cluster command executor

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject};
use kube::{Api, Client};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::executor::ClusterCommandExecutor;
use crate::models::ResourceKind;

/// Executes queries and patches with one lazily created client per context
///
/// The empty context name means "current kubeconfig context".
#[derive(Default)]
pub struct KubeExecutor {
    clients: Mutex<HashMap<String, Client>>,
}

impl KubeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, context: &str) -> Result<Client> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(context) {
            return Ok(client.clone());
        }

        tracing::debug!(context, "Creating Kubernetes client");
        let target = if context.is_empty() { None } else { Some(context) };
        let client = super::create_client_for_context(target).await?;
        clients.insert(context.to_string(), client.clone());
        Ok(client)
    }
}

fn api_resource(kind: ResourceKind) -> ApiResource {
    ApiResource {
        group: kind.group().to_string(),
        version: kind.version().to_string(),
        api_version: kind.api_version(),
        kind: kind.as_str().to_string(),
        plural: kind.plural().to_string(),
    }
}

fn dynamic_api(client: Client, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
    let resource = api_resource(kind);
    match namespace {
        Some(ns) if kind.is_namespaced() => Api::namespaced_with(client, ns, &resource),
        _ => Api::all_with(client, &resource),
    }
}

#[async_trait]
impl ClusterCommandExecutor for KubeExecutor {
    async fn query_resource<'a, 'b>(
        &self,
        context: &str,
        kind: ResourceKind,
        namespace: Option<&'a str>,
        name: Option<&'b str>,
    ) -> Result<Value> {
        let client = self.client(context).await?;
        let api = dynamic_api(client, kind, namespace);
        let scope = namespace.unwrap_or("<all>");

        match name {
            Some(name) => {
                let obj = api.get(name).await.with_context(|| {
                    format!("Failed to get {} {} in namespace {}", kind, name, scope)
                })?;
                serde_json::to_value(&obj).context("Failed to serialize resource")
            }
            None => {
                let list = api
                    .list(&ListParams::default())
                    .await
                    .with_context(|| format!("Failed to list {} in namespace {}", kind, scope))?;
                let items = list
                    .items
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to serialize resource list")?;
                Ok(json!({ "items": items }))
            }
        }
    }

    async fn patch_resource(
        &self,
        context: &str,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
        patch: Value,
    ) -> Result<()> {
        let client = self.client(context).await?;
        let api = dynamic_api(client, kind, Some(namespace));

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| {
                format!("Failed to patch {} {} in namespace {}", kind, name, namespace)
            })?;

        tracing::debug!(context, %kind, name, namespace, "Patch accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_resource_for_application() {
        let resource = api_resource(ResourceKind::Application);
        assert_eq!(resource.group, "argoproj.io");
        assert_eq!(resource.api_version, "argoproj.io/v1alpha1");
        assert_eq!(resource.plural, "applications");
    }

    #[test]
    fn test_api_resource_for_core_group() {
        let resource = api_resource(ResourceKind::ConfigMap);
        assert_eq!(resource.group, "");
        assert_eq!(resource.api_version, "v1");
    }
}
