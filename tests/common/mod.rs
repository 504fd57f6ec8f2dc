//! Shared test fixtures: a scripted cluster executor and payload builders
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use argo9s::executor::ClusterCommandExecutor;
use argo9s::models::ResourceKind;
use async_trait::async_trait;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query {
        context: String,
        kind: ResourceKind,
        namespace: Option<String>,
        name: Option<String>,
    },
    Patch {
        context: String,
        kind: ResourceKind,
        name: String,
        namespace: String,
        patch: Value,
    },
}

type QueryKey = (ResourceKind, Option<String>, Option<String>);
type Scripted = Result<Value, String>;

/// Executor replaying scripted responses and recording every call
///
/// Each query target has a queue of responses; the last one repeats once the
/// queue is drained. Unscripted queries fail with a "not found" error, like a
/// cluster where the resource does not exist.
#[derive(Default)]
pub struct FakeExecutor {
    queries: Mutex<HashMap<QueryKey, VecDeque<Scripted>>>,
    patch_error: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script responses for one query target
    pub fn on_query(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: Option<&str>,
        responses: Vec<Scripted>,
    ) -> &Self {
        let key = (kind, namespace.map(str::to_string), name.map(str::to_string));
        self.queries
            .lock()
            .unwrap()
            .insert(key, responses.into_iter().collect());
        self
    }

    /// Make every patch fail with `message`
    pub fn fail_patches(&self, message: &str) -> &Self {
        *self.patch_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn query_count(&self, kind: ResourceKind) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Query { kind: k, .. } if *k == kind))
            .count()
    }

    /// Queries for an Application list (no name)
    pub fn list_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Query { kind: ResourceKind::Application, name: None, .. }
                )
            })
            .count()
    }

    /// Queries for a single Application
    pub fn get_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Query { kind: ResourceKind::Application, name: Some(_), .. }
                )
            })
            .count()
    }

    pub fn patches(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Patch { patch, .. } => Some(patch),
                Call::Query { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ClusterCommandExecutor for FakeExecutor {
    async fn query_resource<'a, 'b>(
        &self,
        context: &str,
        kind: ResourceKind,
        namespace: Option<&'a str>,
        name: Option<&'b str>,
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(Call::Query {
            context: context.to_string(),
            kind,
            namespace: namespace.map(str::to_string),
            name: name.map(str::to_string),
        });

        let key = (kind, namespace.map(str::to_string), name.map(str::to_string));
        let mut queries = self.queries.lock().unwrap();
        let response = match queries.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!(
                "{} \"{}\" not found",
                kind.plural(),
                name.unwrap_or("")
            )),
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
        self.calls.lock().unwrap().push(Call::Patch {
            context: context.to_string(),
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
            patch,
        });

        match self.patch_error.lock().unwrap().clone() {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

/// Minimal Application resource
pub fn application(name: &str, namespace: &str, sync: &str, health: &str) -> Value {
    json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Application",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "creationTimestamp": "2024-04-10T08:00:00Z"
        },
        "spec": {
            "project": "default",
            "source": {
                "repoURL": "https://github.com/argoproj/argocd-example-apps.git",
                "path": name,
                "targetRevision": "HEAD"
            },
            "destination": {
                "server": "https://kubernetes.default.svc",
                "namespace": name
            }
        },
        "status": {
            "sync": { "status": sync, "revision": "4e1c3f0" },
            "health": { "status": health }
        }
    })
}

/// Application whose last operation is in `phase`
pub fn application_with_operation(
    name: &str,
    namespace: &str,
    phase: &str,
    started_at: &str,
) -> Value {
    let mut app = application(name, namespace, "OutOfSync", "Progressing");
    app["status"]["operationState"] = json!({
        "phase": phase,
        "message": format!("operation {}", phase.to_lowercase()),
        "startedAt": started_at,
        "syncResult": { "revision": "9b2d7a1" }
    });
    app
}

pub fn list_of(items: Vec<Value>) -> Value {
    json!({ "apiVersion": "v1", "kind": "List", "items": items })
}

/// ConfigMap as published by the cooperating operator
pub fn operator_status(report: Value) -> Value {
    json!({
        "metadata": { "name": "argo9s-operator-status", "namespace": "argo9s-system" },
        "data": { "status": report.to_string() }
    })
}

pub fn server_deployment(namespace: &str, image: &str) -> Value {
    json!({
        "metadata": {
            "name": "argocd-server",
            "namespace": namespace,
            "labels": { "app.kubernetes.io/name": "argocd-server" }
        },
        "spec": { "template": { "spec": { "containers": [
            { "name": "argocd-server", "image": image }
        ]}}}
    })
}

pub fn application_crd() -> Value {
    json!({ "metadata": { "name": "applications.argoproj.io" } })
}
