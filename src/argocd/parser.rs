//! Raw Application payload to typed snapshot
//!
//! The Application CRD schema evolves independently of this crate, so parsing
//! is total: every field is optional, unrecognized enumerations collapse to
//! `Unknown` with the raw value kept in a message, and one malformed managed
//! resource never affects its siblings.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{
    Application, ApplicationDestination, ApplicationSource, ArgoCdResource, HealthStatus,
    HealthStatusCode, OperationPhase, OperationState, SyncPolicy, SyncStatus, SyncStatusCode,
};

/// Payload as seen by the parser
enum Payload<'a> {
    /// JSON object, parsed field by field
    Object(&'a Map<String, Value>),
    /// Anything else, parsed into an all-`Unknown` application
    Degraded,
}

impl<'a> Payload<'a> {
    fn classify(raw: &'a Value) -> Self {
        match raw.as_object() {
            Some(obj) => Payload::Object(obj),
            None => Payload::Degraded,
        }
    }
}

/// Convert a raw Application resource into an [`Application`]
///
/// Never fails. Missing fields become empty strings, `None` or `Unknown`.
pub fn parse_application(raw: &Value) -> Application {
    match Payload::classify(raw) {
        Payload::Object(obj) => parse_object(obj),
        Payload::Degraded => {
            tracing::warn!(payload_type = json_type(raw), "Application payload is not an object");
            Application {
                project: "default".to_string(),
                ..Default::default()
            }
        }
    }
}

/// Parse every item of a list payload
pub fn parse_application_list(payload: &Value) -> Vec<Application> {
    crate::executor::list_items(payload)
        .iter()
        .map(parse_application)
        .collect()
}

fn parse_object(obj: &Map<String, Value>) -> Application {
    let metadata = obj.get("metadata");
    let spec = obj.get("spec");
    let status = obj.get("status");

    Application {
        name: string_at(metadata, &["name"]),
        namespace: string_at(metadata, &["namespace"]),
        project: str_at(spec, &["project"])
            .filter(|p| !p.is_empty())
            .unwrap_or("default")
            .to_string(),
        source: parse_source(spec),
        destination: parse_destination(spec),
        sync_policy: parse_sync_policy(spec),
        sync_status: parse_sync_status(status),
        health_status: parse_health(status.and_then(|s| s.get("health"))),
        resources: parse_resources(status),
        last_operation: status
            .and_then(|s| s.get("operationState"))
            .filter(|op| op.is_object())
            .map(parse_operation_state),
        created_at: timestamp_at(metadata, &["creationTimestamp"]),
    }
}

fn parse_source(spec: Option<&Value>) -> ApplicationSource {
    // Multi-source applications carry `sources[]` instead of `source`
    let source = spec
        .and_then(|s| s.get("source"))
        .filter(|s| s.is_object())
        .or_else(|| {
            spec.and_then(|s| s.get("sources"))
                .and_then(|s| s.as_array())
                .and_then(|sources| sources.first())
        });

    ApplicationSource {
        repo_url: string_at(source, &["repoURL"]),
        // Helm chart sources have a chart name rather than a path
        path: str_at(source, &["path"])
            .or_else(|| str_at(source, &["chart"]))
            .unwrap_or_default()
            .to_string(),
        target_revision: str_at(source, &["targetRevision"])
            .unwrap_or("HEAD")
            .to_string(),
    }
}

fn parse_destination(spec: Option<&Value>) -> ApplicationDestination {
    let destination = spec.and_then(|s| s.get("destination"));
    ApplicationDestination {
        server: str_at(destination, &["server"])
            .or_else(|| str_at(destination, &["name"]))
            .unwrap_or_default()
            .to_string(),
        namespace: string_at(destination, &["namespace"]),
    }
}

fn parse_sync_policy(spec: Option<&Value>) -> SyncPolicy {
    let automated = spec
        .and_then(|s| s.get("syncPolicy"))
        .and_then(|p| p.get("automated"))
        .filter(|a| a.is_object());

    SyncPolicy {
        automated: automated.is_some(),
        prune: bool_at(automated, &["prune"]),
        self_heal: bool_at(automated, &["selfHeal"]),
    }
}

fn parse_sync_status(status: Option<&Value>) -> SyncStatus {
    let sync = status.and_then(|s| s.get("sync"));
    let raw = str_at(sync, &["status"]);
    let (code, message) = sync_code(raw);

    let revision = str_at(sync, &["revision"])
        .or_else(|| {
            sync.and_then(|s| s.get("revisions"))
                .and_then(|r| r.as_array())
                .and_then(|r| r.first())
                .and_then(|r| r.as_str())
        })
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    SyncStatus {
        code,
        revision,
        message,
    }
}

fn parse_health(health: Option<&Value>) -> HealthStatus {
    let raw = str_at(health, &["status"]);
    let upstream_message = str_at(health, &["message"]).map(str::to_string);
    let (code, unrecognized) = health_code(raw);

    HealthStatus {
        code,
        message: join_notes([upstream_message, unrecognized]),
    }
}

fn parse_resources(status: Option<&Value>) -> Vec<ArgoCdResource> {
    status
        .and_then(|s| s.get("resources"))
        .and_then(|r| r.as_array())
        .map(|resources| resources.iter().map(parse_resource).collect())
        .unwrap_or_default()
}

fn parse_resource(raw: &Value) -> ArgoCdResource {
    let entry = Some(raw);
    let health = raw.get("health");
    let (sync_status, sync_note) = sync_code(str_at(entry, &["status"]));
    let (health_status, health_note) = health_code(str_at(health, &["status"]));

    let upstream = str_at(health, &["message"])
        .or_else(|| str_at(entry, &["message"]))
        .map(str::to_string);
    let message = join_notes([upstream, sync_note, health_note]);

    ArgoCdResource {
        group: string_at(entry, &["group"]),
        kind: string_at(entry, &["kind"]),
        name: string_at(entry, &["name"]),
        namespace: string_at(entry, &["namespace"]),
        sync_status,
        health_status,
        message,
    }
}

fn parse_operation_state(raw: &Value) -> OperationState {
    let op = Some(raw);
    let phase_raw = str_at(op, &["phase"]);
    let phase = phase_raw.and_then(OperationPhase::parse_optional);
    if phase.is_none() {
        if let Some(value) = phase_raw {
            tracing::debug!(phase = value, "Unrecognized operation phase");
        }
    }

    OperationState {
        phase,
        message: str_at(op, &["message"])
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        started_at: timestamp_at(op, &["startedAt"]),
        finished_at: timestamp_at(op, &["finishedAt"]),
        sync_revision: str_at(op, &["syncResult", "revision"]).map(str::to_string),
    }
}

/// Map a sync value, returning a note when it was not recognized
fn sync_code(raw: Option<&str>) -> (SyncStatusCode, Option<String>) {
    match raw {
        None => (SyncStatusCode::Unknown, None),
        Some(value) => match SyncStatusCode::parse_optional(value) {
            Some(code) => (code, None),
            None => (
                SyncStatusCode::Unknown,
                Some(format!("unrecognized sync status: {}", value)),
            ),
        },
    }
}

/// Map a health value, returning a note when it was not recognized
fn health_code(raw: Option<&str>) -> (HealthStatusCode, Option<String>) {
    match raw {
        None => (HealthStatusCode::Unknown, None),
        Some(value) => match HealthStatusCode::parse_optional(value) {
            Some(code) => (code, None),
            None => (
                HealthStatusCode::Unknown,
                Some(format!("unrecognized health status: {}", value)),
            ),
        },
    }
}

/// Join the present notes with `; `
fn join_notes<const N: usize>(notes: [Option<String>; N]) -> Option<String> {
    let present: Vec<String> = notes.into_iter().flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join("; "))
    }
}

fn value_at<'a>(root: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root?, |current, key| current.get(*key))
}

fn str_at<'a>(root: Option<&'a Value>, path: &[&str]) -> Option<&'a str> {
    value_at(root, path).and_then(|v| v.as_str())
}

fn string_at(root: Option<&Value>, path: &[&str]) -> String {
    str_at(root, path).unwrap_or_default().to_string()
}

fn bool_at(root: Option<&Value>, path: &[&str]) -> bool {
    value_at(root, path)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn timestamp_at(root: Option<&Value>, path: &[&str]) -> Option<DateTime<Utc>> {
    str_at(root, path)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_walks_nested_objects() {
        let v = json!({"a": {"b": {"c": "x"}}});
        assert_eq!(str_at(Some(&v), &["a", "b", "c"]), Some("x"));
        assert_eq!(str_at(Some(&v), &["a", "missing", "c"]), None);
        assert_eq!(str_at(None, &["a"]), None);
        // Walking through a non-object yields None rather than panicking
        assert_eq!(str_at(Some(&v), &["a", "b", "c", "d"]), None);
    }

    #[test]
    fn test_unrecognized_codes_carry_note() {
        let (code, note) = sync_code(Some("Syncing"));
        assert_eq!(code, SyncStatusCode::Unknown);
        assert_eq!(note.as_deref(), Some("unrecognized sync status: Syncing"));

        let (code, note) = health_code(Some("Healthy"));
        assert_eq!(code, HealthStatusCode::Healthy);
        assert!(note.is_none());
    }

    #[test]
    fn test_resource_keeps_every_note() {
        let resource = parse_resource(&json!({
            "kind": "Deployment",
            "name": "web",
            "status": "Drifting",
            "health": {"status": "Hibernating", "message": "scaled to zero"}
        }));
        assert_eq!(resource.sync_status, SyncStatusCode::Unknown);
        assert_eq!(resource.health_status, HealthStatusCode::Unknown);
        assert_eq!(
            resource.message.as_deref(),
            Some("scaled to zero; unrecognized sync status: Drifting; unrecognized health status: Hibernating")
        );

        let plain = parse_resource(&json!({"kind": "Service", "name": "web", "status": "Synced"}));
        assert!(plain.message.is_none());
    }

    #[test]
    fn test_timestamp_parsing() {
        let v = json!({"t": "2024-03-01T10:00:00Z", "bad": "yesterday"});
        assert!(timestamp_at(Some(&v), &["t"]).is_some());
        assert!(timestamp_at(Some(&v), &["bad"]).is_none());
    }

    #[test]
    fn test_degraded_payloads() {
        for raw in [json!(null), json!("guestbook"), json!([1, 2]), json!(42)] {
            let app = parse_application(&raw);
            assert_eq!(app.sync_status.code, SyncStatusCode::Unknown);
            assert_eq!(app.health_status.code, HealthStatusCode::Unknown);
            assert!(app.resources.is_empty());
            assert!(app.last_operation.is_none());
        }
    }
}
