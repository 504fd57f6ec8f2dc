//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use super::{defaults, paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Context-specific config
    /// 3. Root config
    /// 4. Built-in defaults
    pub fn load(context: Option<&str>) -> Result<Config> {
        let mut config = Self::load_defaults();

        let root_path = paths::root_config_path();
        if root_path.exists() {
            config = Self::load_file(&root_path)?;
        }

        if let Some(context_name) = context {
            let context_path = paths::context_config_path(context_name);
            if context_path.exists() {
                let context_config = Self::load_file(&context_path)?;
                config = Self::merge_config(config, context_config);
            }
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration by loading and checking for errors
    pub fn validate(context: Option<&str>) -> Result<()> {
        let config = Self::load(context).context("Failed to load merged configuration")?;

        if config.tracking.poll_interval_millis == 0 {
            anyhow::bail!("tracking.pollIntervalMillis must be greater than 0");
        }
        if config.tracking.timeout_seconds == 0 {
            anyhow::bail!("tracking.timeoutSeconds must be greater than 0");
        }
        if config.argocd.server_deployment.is_empty() {
            anyhow::bail!("argocd.serverDeployment must not be empty");
        }

        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Merge two configurations, with `other` taking precedence
    ///
    /// Context files usually set only a field or two; everything else
    /// deserializes to its default. A field of `other` wins only when it
    /// differs from the default, so unset fields keep the base value.
    fn merge_config(base: Config, other: Config) -> Config {
        fn pick<T: PartialEq>(base: T, other: T, default: T) -> T {
            if other != default { other } else { base }
        }

        let defaults = Config::default();
        Config {
            default_context: other.default_context.or(base.default_context),
            argocd: super::schema::ArgoCdConfig {
                default_namespace: pick(
                    base.argocd.default_namespace,
                    other.argocd.default_namespace,
                    defaults.argocd.default_namespace,
                ),
                candidate_namespaces: if other.argocd.candidate_namespaces.is_empty() {
                    base.argocd.candidate_namespaces
                } else {
                    pick(
                        base.argocd.candidate_namespaces,
                        other.argocd.candidate_namespaces,
                        defaults.argocd.candidate_namespaces,
                    )
                },
                server_deployment: pick(
                    base.argocd.server_deployment,
                    other.argocd.server_deployment,
                    defaults.argocd.server_deployment,
                ),
            },
            operator: super::schema::OperatorConfig {
                namespace: pick(
                    base.operator.namespace,
                    other.operator.namespace,
                    defaults.operator.namespace,
                ),
                status_config_map: pick(
                    base.operator.status_config_map,
                    other.operator.status_config_map,
                    defaults.operator.status_config_map,
                ),
            },
            cache: super::schema::CacheConfig {
                installation_ttl_seconds: pick(
                    base.cache.installation_ttl_seconds,
                    other.cache.installation_ttl_seconds,
                    defaults.cache.installation_ttl_seconds,
                ),
                application_ttl_seconds: pick(
                    base.cache.application_ttl_seconds,
                    other.cache.application_ttl_seconds,
                    defaults.cache.application_ttl_seconds,
                ),
            },
            tracking: super::schema::TrackingConfig {
                poll_interval_millis: pick(
                    base.tracking.poll_interval_millis,
                    other.tracking.poll_interval_millis,
                    defaults.tracking.poll_interval_millis,
                ),
                timeout_seconds: pick(
                    base.tracking.timeout_seconds,
                    other.tracking.timeout_seconds,
                    defaults.tracking.timeout_seconds,
                ),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Config {
        // ARGO9S_CONTEXT override
        if let Ok(context) = std::env::var("ARGO9S_CONTEXT") {
            if !context.is_empty() {
                config.default_context = Some(context);
            }
        }

        // ARGO9S_ARGOCD_NAMESPACE override
        if let Ok(namespace) = std::env::var("ARGO9S_ARGOCD_NAMESPACE") {
            if !namespace.is_empty() {
                config.argocd.default_namespace = namespace.clone();
                if !config.argocd.candidate_namespaces.contains(&namespace) {
                    config.argocd.candidate_namespaces.insert(0, namespace);
                }
            }
        }

        // ARGO9S_TRACK_TIMEOUT override (seconds)
        if let Ok(timeout) = std::env::var("ARGO9S_TRACK_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) => config.tracking.timeout_seconds = secs,
                Err(_) => tracing::warn!("Ignoring invalid ARGO9S_TRACK_TIMEOUT: {}", timeout),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }

    /// Save context-specific configuration
    pub fn save_context(config: &Config, context: &str) -> Result<()> {
        Self::save(config, &paths::context_config_path(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.argocd.server_deployment, "argocd-server");
    }

    #[test]
    fn test_merge_config() {
        let base = Config {
            default_context: Some("base-ctx".to_string()),
            ..Default::default()
        };
        let mut other = Config::default();
        other.argocd.default_namespace = "gitops".to_string();
        other.argocd.candidate_namespaces = Vec::new();

        let merged = ConfigLoader::merge_config(base, other);
        assert_eq!(merged.default_context.as_deref(), Some("base-ctx"));
        assert_eq!(merged.argocd.default_namespace, "gitops");
        assert_eq!(merged.argocd.candidate_namespaces.len(), 3);
    }

    #[test]
    fn test_merge_keeps_base_when_other_is_default() {
        let mut base = Config::default();
        base.tracking.timeout_seconds = 900;
        base.argocd.server_deployment = "gitops-server".to_string();

        let merged = ConfigLoader::merge_config(base, Config::default());
        assert_eq!(merged.tracking.timeout_seconds, 900);
        assert_eq!(merged.argocd.server_deployment, "gitops-server");
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let dir = tempfile::tempdir().unwrap();
        let root_path = dir.path().join("config.yaml");
        let context_path = dir.path().join("prod.yaml");
        std::fs::write(&root_path, "tracking:\n  pollIntervalMillis: 500\n").unwrap();
        std::fs::write(&context_path, "tracking:\n  timeoutSeconds: 60\ncache:\n  applicationTtlSeconds: 10\n").unwrap();

        let root = ConfigLoader::load_file(&root_path).unwrap();
        let context = ConfigLoader::load_file(&context_path).unwrap();
        let merged = ConfigLoader::merge_config(root, context);

        assert_eq!(merged.tracking.poll_interval_millis, 500);
        assert_eq!(merged.tracking.timeout_seconds, 60);
        assert_eq!(merged.cache.application_ttl_seconds, 10);
        assert_eq!(merged.cache.installation_ttl_seconds, 300);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.tracking.timeout_seconds = 42;

        ConfigLoader::save(&config, &path).unwrap();
        let loaded = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: set_var is unsafe in Rust 2024 due to potential data races.
        // The variables are unique to this test and removed before it returns.
        unsafe {
            std::env::set_var("ARGO9S_ARGOCD_NAMESPACE", "platform-argocd");
            std::env::set_var("ARGO9S_TRACK_TIMEOUT", "90");
        }

        let config = ConfigLoader::apply_env_overrides(Config::default());

        assert_eq!(config.argocd.default_namespace, "platform-argocd");
        assert_eq!(config.argocd.candidate_namespaces[0], "platform-argocd");
        assert_eq!(config.tracking.timeout_seconds, 90);

        // SAFETY: see above
        unsafe {
            std::env::remove_var("ARGO9S_ARGOCD_NAMESPACE");
            std::env::remove_var("ARGO9S_TRACK_TIMEOUT");
        }
    }
}
