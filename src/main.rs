//! argo9s - ArgoCD detection, application queries and sync tracking
//!
//! Thin command-line front end over the `argo9s` library.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use argo9s::argocd::SyncOptions;
use argo9s::cli::{self, ConfigSubcommand, SyncRequest};
use argo9s::config::ConfigLoader;
use argo9s::kube::KubeExecutor;
use argo9s::services::ArgoCdService;

/// Detect ArgoCD, inspect Applications and track syncs across Kubernetes contexts
#[derive(Parser, Debug)]
#[command(name = "argo9s")]
#[command(about = "Detect ArgoCD, inspect Applications and track syncs", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Kubeconfig context (defaults to config defaultContext, then the current context)
    #[arg(long, global = true)]
    context: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Detect whether ArgoCD is installed
    Detect {
        /// Ignore the cached result
        #[arg(long)]
        refresh: bool,
    },
    /// Detect ArgoCD in every kubeconfig context
    Contexts,
    /// List applications
    List {
        /// Namespace holding the Application resources (defaults to the installation namespace)
        #[arg(long, short = 'n')]
        namespace: Option<String>,
    },
    /// Show one application
    Get {
        name: String,
        #[arg(long, short = 'n')]
        namespace: Option<String>,
    },
    /// Request a sync
    Sync {
        name: String,
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Revision to sync to (defaults to the application's target revision)
        #[arg(long)]
        revision: Option<String>,
        /// Delete resources that are no longer in the source
        #[arg(long)]
        prune: bool,
        #[arg(long)]
        dry_run: bool,
        /// Wait for the sync to finish
        #[arg(long)]
        wait: bool,
        /// Seconds to wait with --wait (defaults to tracking.timeoutSeconds)
        #[arg(long, requires = "wait")]
        timeout: Option<u64>,
    },
    /// Request a refresh
    Refresh {
        name: String,
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Regenerate manifests instead of re-comparing cached ones
        #[arg(long)]
        hard: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Version => {
            cli::display_version();
            return Ok(());
        }
        Command::Config { subcommand } => {
            return cli::handle_config_command(subcommand, args.context.as_deref()).await;
        }
        _ => {}
    }

    let log_file = cli::init_logging(args.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    // Root config first: it may name the default context
    let root = ConfigLoader::load(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load configuration, using defaults");
        ConfigLoader::load_defaults()
    });
    let context = match args.context.or(root.default_context) {
        Some(context) => context,
        None => argo9s::kube::current_context().context("No context given and none is current")?,
    };
    let config = ConfigLoader::load(Some(&context)).unwrap_or_else(|e| {
        tracing::warn!(context = %context, error = %e, "Failed to load context configuration, using defaults");
        ConfigLoader::load_defaults()
    });
    tracing::debug!(context = %context, "Configuration loaded");

    let service = ArgoCdService::new(Arc::new(KubeExecutor::new()), &config);

    match args.command {
        Command::Detect { refresh } => cli::handle_detect(&service, &context, refresh, args.json).await,
        Command::Contexts => cli::handle_contexts(&service, args.json).await,
        Command::List { namespace } => {
            cli::handle_list(&service, &context, namespace.as_deref(), args.json).await
        }
        Command::Get { name, namespace } => {
            cli::handle_get(&service, &context, &name, namespace.as_deref(), args.json).await
        }
        Command::Sync {
            name,
            namespace,
            revision,
            prune,
            dry_run,
            wait,
            timeout,
        } => {
            let request = SyncRequest {
                name: &name,
                namespace: namespace.as_deref(),
                options: SyncOptions {
                    revision,
                    prune,
                    dry_run,
                },
                wait,
                timeout: timeout.map(Duration::from_secs),
            };
            cli::handle_sync(&service, &context, request, args.json).await
        }
        Command::Refresh {
            name,
            namespace,
            hard,
        } => cli::handle_refresh(&service, &context, &name, namespace.as_deref(), hard).await,
        Command::Version | Command::Config { .. } => Ok(()),
    }
}
