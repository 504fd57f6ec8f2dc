//! `argo9s config` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{ConfigLoader, paths};

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "argocd.defaultNamespace", "tracking.timeoutSeconds")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "argocd.defaultNamespace", "tracking.timeoutSeconds")
        key: String,
        /// Configuration value
        value: String,
        /// Save to the context-specific file instead of the root config
        #[arg(long)]
        context: Option<String>,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Handle configuration subcommands
///
/// `context` selects which per-context overrides are layered in when reading.
pub async fn handle_config_command(cmd: ConfigSubcommand, context: Option<&str>) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load(context).context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = crate::config::get_config_value(&config, &key)?;
                println!("{}", value);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set {
            key,
            value,
            context: target,
        } => {
            // Context files hold overrides only, so start them from whatever is on disk
            let mut config = match target.as_deref() {
                Some(name) => {
                    let path = paths::context_config_path(name);
                    if path.exists() {
                        ConfigLoader::load_file(&path)?
                    } else {
                        ConfigLoader::load_defaults()
                    }
                }
                None => ConfigLoader::load(None).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Existing configuration unreadable, starting from defaults");
                    ConfigLoader::load_defaults()
                }),
            };

            crate::config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            match target {
                Some(name) => {
                    ConfigLoader::save_context(&config, &name)
                        .context("Failed to save context configuration")?;
                    println!("Configuration saved for context: {}", name);
                }
                None => {
                    ConfigLoader::save_root(&config).context("Failed to save configuration")?;
                    println!("Configuration saved");
                }
            }
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load(context).context("Failed to load configuration")?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
            if let Some(name) = context {
                println!("{}", paths::context_config_path(name).display());
            }
        }
        ConfigSubcommand::Validate => {
            ConfigLoader::validate(context).context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
