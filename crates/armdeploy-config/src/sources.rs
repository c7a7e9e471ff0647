// Configuration source loading.
//
// Priority order:
// 1. Environment variables (ARMDEPLOY_* prefix)
// 2. Config file path from ARMDEPLOY_CONFIG
// 3. Inline config content from ARMDEPLOY_CONFIG_CONTENT
// 4. Default config files (./armdeploy.toml, ./.armdeploy.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource};
use crate::*;
use anyhow::{Context, Result};
use std::path::Path;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["./armdeploy.toml", "./.armdeploy.toml"];

/// Load configuration from the discovered file (if any) plus env overrides.
pub fn load_config<E: EnvSource>(env: &E) -> Result<DeployConfig> {
    let mut config = load_from_file(env)?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<DeployConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return parse_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: DeployConfig = toml::from_str(&content)
            .context("Failed to parse inline config from ARMDEPLOY_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return parse_file(path).map(Some);
        }
    }

    Ok(None)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path<E: EnvSource>(path: impl AsRef<Path>, env: &E) -> Result<DeployConfig> {
    let mut config = parse_file(path.as_ref())?;
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<DeployConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
