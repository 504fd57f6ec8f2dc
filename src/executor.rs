//! Cluster command executor seam
//!
//! Everything that talks to a cluster goes through this trait. The engine only
//! ever sees raw JSON payloads and `anyhow` errors; classification happens in
//! [`crate::error`]. [`crate::kube::KubeExecutor`] is the kube-rs backed
//! implementation, tests substitute scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::ResourceKind;

/// Query and patch resources in a named kubeconfig context
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterCommandExecutor: Send + Sync {
    /// Fetch one resource (when `name` is set) or a list
    ///
    /// A list comes back as `{"items": [...]}`. `namespace: None` means
    /// cluster-scoped for cluster resources and all namespaces otherwise.
    async fn query_resource<'a, 'b>(
        &self,
        context: &str,
        kind: ResourceKind,
        namespace: Option<&'a str>,
        name: Option<&'b str>,
    ) -> Result<Value>;

    /// Apply a JSON merge patch to a namespaced resource
    async fn patch_resource(
        &self,
        context: &str,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
        patch: Value,
    ) -> Result<()>;
}

/// Extract `items` from a list payload, tolerating a bare array
pub fn list_items(payload: &Value) -> &[Value] {
    payload
        .get("items")
        .and_then(|items| items.as_array())
        .or_else(|| payload.as_array())
        .map(|items| items.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_items_shapes() {
        assert_eq!(list_items(&json!({"items": [1, 2]})).len(), 2);
        assert_eq!(list_items(&json!([1, 2, 3])).len(), 3);
        assert!(list_items(&json!({"kind": "List"})).is_empty());
        assert!(list_items(&json!(null)).is_empty());
    }
}
