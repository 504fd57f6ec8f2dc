//! Configuration system for argo9s
//!
//! Layered YAML configuration: built-in defaults, a root file, optional
//! per-context files and environment overrides.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{ArgoCdConfig, CacheConfig, Config, OperatorConfig, TrackingConfig};

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &schema::Config, key: &str) -> anyhow::Result<String> {
    match key {
        "defaultContext" => Ok(config.default_context.clone().unwrap_or_default()),
        "argocd.defaultNamespace" => Ok(config.argocd.default_namespace.clone()),
        "argocd.candidateNamespaces" => Ok(config.argocd.candidate_namespaces.join(",")),
        "argocd.serverDeployment" => Ok(config.argocd.server_deployment.clone()),
        "operator.namespace" => Ok(config.operator.namespace.clone()),
        "operator.statusConfigMap" => Ok(config.operator.status_config_map.clone()),
        "cache.installationTtlSeconds" => Ok(config.cache.installation_ttl_seconds.to_string()),
        "cache.applicationTtlSeconds" => Ok(config.cache.application_ttl_seconds.to_string()),
        "tracking.pollIntervalMillis" => Ok(config.tracking.poll_interval_millis.to_string()),
        "tracking.timeoutSeconds" => Ok(config.tracking.timeout_seconds.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut schema::Config, key: &str, value: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    match key {
        "defaultContext" => {
            config.default_context = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        "argocd.defaultNamespace" => {
            config.argocd.default_namespace = value.to_string();
        }
        "argocd.candidateNamespaces" => {
            config.argocd.candidate_namespaces = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "argocd.serverDeployment" => {
            config.argocd.server_deployment = value.to_string();
        }
        "operator.namespace" => {
            config.operator.namespace = value.to_string();
        }
        "operator.statusConfigMap" => {
            config.operator.status_config_map = value.to_string();
        }
        "cache.installationTtlSeconds" => {
            config.cache.installation_ttl_seconds = value
                .parse()
                .context("cache.installationTtlSeconds must be a number")?;
        }
        "cache.applicationTtlSeconds" => {
            config.cache.application_ttl_seconds = value
                .parse()
                .context("cache.applicationTtlSeconds must be a number")?;
        }
        "tracking.pollIntervalMillis" => {
            config.tracking.poll_interval_millis = value
                .parse()
                .context("tracking.pollIntervalMillis must be a number")?;
        }
        "tracking.timeoutSeconds" => {
            config.tracking.timeout_seconds = value
                .parse()
                .context("tracking.timeoutSeconds must be a number")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        set_config_value(&mut config, "argocd.candidateNamespaces", "a, b,,c").unwrap();
        assert_eq!(
            get_config_value(&config, "argocd.candidateNamespaces").unwrap(),
            "a,b,c"
        );

        set_config_value(&mut config, "tracking.timeoutSeconds", "45").unwrap();
        assert_eq!(config.tracking.timeout_seconds, 45);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "tracking.timeoutSeconds", "soon").is_err());
        assert!(set_config_value(&mut config, "argocd.port", "8080").is_err());
        assert!(get_config_value(&config, "cache.size").is_err());
    }
}
