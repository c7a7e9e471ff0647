use super::{DeployConfig, LogFormat, ParametersConfig, TemplateConfig, DEFAULT_CONTENT_VERSION};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use tracing::warn;

pub const ENV_PREFIX: &str = "ARMDEPLOY_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source instead of the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the ARMDEPLOY_ prefix.
    /// Used for the AZURE_* credential variables and HOME.
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment keyed by full variable name.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut DeployConfig, env: &E) -> Result<()> {
    // Cloud selection
    if let Some(name) = get_env_string(env, "ENVIRONMENT")? {
        config.azure.environment = name
            .parse()
            .context("Invalid ARMDEPLOY_ENVIRONMENT value")?;
    }
    if let Some(host) = get_env_string(env, "AUTHORITY_HOST")? {
        config.azure.authority_host = Some(trim_trailing_slash(host));
    }
    if let Some(endpoint) = get_env_string(env, "RESOURCE_MANAGER_ENDPOINT")? {
        config.azure.resource_manager_endpoint = Some(trim_trailing_slash(endpoint));
    }

    // Deployment target
    if let Some(group) = get_env_string(env, "RESOURCE_GROUP")? {
        config.deployment.resource_group = group;
    }
    if let Some(location) = get_env_string(env, "LOCATION")? {
        config.deployment.location = location;
    }
    if let Some(name) = get_env_string(env, "DEPLOYMENT_NAME")? {
        config.deployment.name = name;
    }
    if let Some(prefix) = get_env_string(env, "DNS_PREFIX")? {
        config.deployment.dns_prefix = prefix;
    }
    if let Some(vm_name) = get_env_string(env, "VM_NAME")? {
        config.deployment.vm_name = vm_name;
    }
    if let Some(user) = get_env_string(env, "ADMIN_USERNAME")? {
        config.deployment.admin_username = user;
    }
    if let Some(val) = get_env_bool(env, "VALIDATE")? {
        config.deployment.validate = val;
    }

    // Template source; a URI wins over a path when both are set
    if let Some(path) = get_env_string(env, "TEMPLATE_PATH")? {
        config.template = TemplateConfig::File { path };
    }
    if let Some(uri) = get_env_string(env, "TEMPLATE_URI")? {
        config.template = TemplateConfig::Link {
            uri,
            content_version: DEFAULT_CONTENT_VERSION.to_string(),
        };
    }

    // Parameter source
    if let Some(uri) = get_env_string(env, "PARAMETERS_URI")? {
        config.parameters = ParametersConfig::Link {
            uri,
            content_version: DEFAULT_CONTENT_VERSION.to_string(),
        };
    }
    if let Some(path) = get_env_string(env, "SSH_KEY_PATH")? {
        match &mut config.parameters {
            ParametersConfig::Inline { ssh_key_path, .. } => *ssh_key_path = Some(path),
            ParametersConfig::Link { .. } => {
                warn!("ARMDEPLOY_SSH_KEY_PATH ignored: parameters come from a remote link");
            }
        }
    }

    // Teardown
    if let Some(policy) = get_env_string(env, "TEARDOWN")? {
        config.teardown.policy = policy
            .parse()
            .context("Invalid ARMDEPLOY_TEARDOWN value")?;
    }
    if let Some(val) = get_env_bool(env, "TEARDOWN_ON_ERROR")? {
        config.teardown.on_error = val;
    }

    // Polling
    if let Some(val) = get_env_u64(env, "POLL_INTERVAL_SECS")? {
        config.polling.interval_secs = val;
    }
    if let Some(val) = get_env_u64(env, "POLL_TIMEOUT_SECS")? {
        config.polling.timeout_secs = val;
    }
    if let Some(val) = get_env_u64(env, "REQUEST_TIMEOUT_SECS")? {
        config.azure.request_timeout_secs = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => bail!(
                "Invalid {}LOG_FORMAT '{}'. Must be one of: text, json",
                ENV_PREFIX,
                other
            ),
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key).filter(|val| !val.is_empty()))
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn trim_trailing_slash(value: String) -> String {
    value.trim_end_matches('/').to_string()
}
