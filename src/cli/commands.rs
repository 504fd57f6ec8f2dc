//! ArgoCD command handlers
//!
//! Handlers print either a fixed-width table or JSON and turn classified
//! errors into user-facing messages.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::argocd::{OperationResult, SyncOptions};
use crate::error::ArgoError;
use crate::models::{Application, InstallationStatus};
use crate::services::ArgoCdService;

/// Wrap a classified error with its short user message
fn surface(err: ArgoError) -> anyhow::Error {
    let summary = err.kind().user_message();
    anyhow::Error::new(err).context(summary)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn print_installation(context: &str, status: &InstallationStatus) {
    if status.installed {
        println!(
            "{:<30} installed  namespace={} version={} mode={}",
            context,
            dash(status.namespace.as_deref()),
            dash(status.version.as_deref()),
            status.mode
        );
    } else {
        println!("{:<30} not installed", context);
    }
}

/// `argo9s detect`
pub async fn handle_detect(service: &ArgoCdService, context: &str, refresh: bool, json: bool) -> Result<()> {
    let status = service.resolve(context, refresh).await;
    if json {
        return print_json(&status);
    }
    print_installation(context, &status);
    Ok(())
}

#[derive(Serialize)]
struct ContextInstallation<'a> {
    context: &'a str,
    #[serde(flatten)]
    status: &'a InstallationStatus,
}

/// `argo9s contexts`: detection across every kubeconfig context
pub async fn handle_contexts(service: &ArgoCdService, json: bool) -> Result<()> {
    let contexts = crate::kube::list_contexts()?;
    if contexts.is_empty() {
        println!("No contexts found in kubeconfig");
        return Ok(());
    }

    let results = service.resolve_many(&contexts).await;
    if json {
        let rows: Vec<ContextInstallation<'_>> = results
            .iter()
            .map(|(context, status)| ContextInstallation { context, status })
            .collect();
        return print_json(&rows);
    }

    for (context, status) in &results {
        print_installation(context, status);
    }
    Ok(())
}

/// `argo9s list`
pub async fn handle_list(
    service: &ArgoCdService,
    context: &str,
    namespace: Option<&str>,
    json: bool,
) -> Result<()> {
    let apps = service.list_applications(context, namespace, false).await;
    if json {
        return print_json(&apps);
    }

    if apps.is_empty() {
        println!("No applications found");
        return Ok(());
    }

    println!(
        "{:<32} {:<16} {:<10} {:<12} {:<10} {}",
        "NAME", "PROJECT", "SYNC", "HEALTH", "DRIFTED", "REVISION"
    );
    for app in &apps {
        println!(
            "{:<32} {:<16} {:<10} {:<12} {:<10} {}",
            app.name,
            app.project,
            app.sync_status.code,
            app.health_status.code,
            app.drifted_resources().count(),
            dash(app.sync_status.revision.as_deref()),
        );
    }
    Ok(())
}

fn print_application(app: &Application) {
    println!("Name:        {}", app.qualified_name());
    println!("Project:     {}", app.project);
    println!("Source:      {} ({}) @ {}", app.source.repo_url, app.source.path, app.source.target_revision);
    println!("Destination: {} / {}", app.destination.server, app.destination.namespace);
    println!(
        "Sync:        {} {}",
        app.sync_status.code,
        dash(app.sync_status.revision.as_deref())
    );
    println!(
        "Health:      {} {}",
        app.health_status.code,
        app.health_status.message.as_deref().unwrap_or("")
    );
    if app.sync_policy.automated {
        println!(
            "Auto-sync:   prune={} selfHeal={}",
            app.sync_policy.prune, app.sync_policy.self_heal
        );
    }
    if let Some(op) = &app.last_operation {
        println!(
            "Operation:   {} {}",
            op.phase.map(|p| p.as_str()).unwrap_or("Unknown"),
            op.message.as_deref().unwrap_or("")
        );
    }

    if !app.resources.is_empty() {
        println!();
        println!("{:<24} {:<40} {:<10} {}", "KIND", "NAME", "SYNC", "HEALTH");
        for resource in &app.resources {
            println!(
                "{:<24} {:<40} {:<10} {}",
                resource.kind, resource.name, resource.sync_status, resource.health_status
            );
        }
    }
}

/// `argo9s get`
pub async fn handle_get(
    service: &ArgoCdService,
    context: &str,
    name: &str,
    namespace: Option<&str>,
    json: bool,
) -> Result<()> {
    let app = service
        .get_application(context, name, namespace)
        .await
        .map_err(surface)?;
    if json {
        return print_json(&app);
    }
    print_application(&app);
    Ok(())
}

/// What `argo9s sync` should do after requesting the sync
pub struct SyncRequest<'a> {
    pub name: &'a str,
    pub namespace: Option<&'a str>,
    pub options: SyncOptions,
    pub wait: bool,
    pub timeout: Option<Duration>,
}

/// `argo9s sync`
///
/// With `wait`, blocks until the operation settles; Ctrl-C stops waiting
/// without touching the operation.
pub async fn handle_sync(
    service: &ArgoCdService,
    context: &str,
    request: SyncRequest<'_>,
    json: bool,
) -> Result<()> {
    let app = service
        .get_application(context, request.name, request.namespace)
        .await
        .map_err(surface)?;

    if !request.wait {
        service
            .actions()
            .sync_with(context, &app, &request.options)
            .await
            .map_err(surface)?;
        println!("Sync requested for {}", app.qualified_name());
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut track = service.track_defaults();
    if let Some(timeout) = request.timeout {
        track.timeout = timeout;
    }

    let outcome = service
        .sync_and_track(context, &app, &request.options, track, cancel)
        .await;
    interrupt.abort();
    let result = outcome.map_err(surface)?;

    if json {
        print_json(&result)?;
    } else {
        match &result {
            OperationResult::Succeeded(op) => println!(
                "Sync of {} succeeded at revision {}",
                app.qualified_name(),
                dash(op.sync_revision.as_deref())
            ),
            OperationResult::Failed(op) => println!(
                "Sync of {} failed: {}",
                app.qualified_name(),
                op.message.as_deref().unwrap_or("no message")
            ),
            OperationResult::TimedOut => println!(
                "Stopped waiting for {}, the sync may still complete",
                app.qualified_name()
            ),
            OperationResult::Cancelled => {
                println!("Stopped waiting for {}", app.qualified_name())
            }
        }
    }

    if let OperationResult::Failed(_) = result {
        anyhow::bail!("sync of {} failed", app.qualified_name());
    }
    Ok(())
}

/// `argo9s refresh`
pub async fn handle_refresh(
    service: &ArgoCdService,
    context: &str,
    name: &str,
    namespace: Option<&str>,
    hard: bool,
) -> Result<()> {
    let app = service
        .get_application(context, name, namespace)
        .await
        .map_err(surface)?;

    let actions = service.actions();
    let outcome = if hard {
        actions.hard_refresh(context, &app).await
    } else {
        actions.refresh(context, &app).await
    };
    outcome.map_err(surface)?;

    println!(
        "{} requested for {}",
        if hard { "Hard refresh" } else { "Refresh" },
        app.qualified_name()
    );
    Ok(())
}
