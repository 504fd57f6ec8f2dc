//! Where argo9s keeps its configuration files

use std::path::{Path, PathBuf};

const APP_DIR: &str = "argo9s";

/// `ARGO9S_CONFIG_DIR`, else the platform config directory joined with `argo9s`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARGO9S_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    platform_config_home().join(APP_DIR)
}

// XDG layout on macOS as well
#[cfg(not(windows))]
fn platform_config_home() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"))
}

#[cfg(windows)]
fn platform_config_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".config"))
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Get the context-specific config file path
///
/// Context names may contain `/` and `:` (EKS ARNs), which are flattened.
pub fn context_config_path(context: &str) -> PathBuf {
    let sanitized: String = context
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    config_dir()
        .join("contexts")
        .join(sanitized)
        .join("config.yaml")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.to_string_lossy().contains("argo9s"));
    }

    #[test]
    fn test_context_path_is_flattened() {
        let path = context_config_path("arn:aws:eks:eu-west-1:123:cluster/prod");
        let rendered = path.to_string_lossy();
        assert!(rendered.contains("arn_aws_eks_eu-west-1_123_cluster_prod"));
        assert!(rendered.ends_with("config.yaml"));
    }
}
