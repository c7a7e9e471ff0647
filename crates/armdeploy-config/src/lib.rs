// armdeploy-config - Configuration for template deployments
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from ARMDEPLOY_CONFIG env var
// 3. Config file contents from ARMDEPLOY_CONFIG_CONTENT env var
// 4. Default config file locations (./armdeploy.toml, ./.armdeploy.toml)
// 5. Built-in defaults (lowest priority)
//
// Service principal credentials are never read from files; they always come
// from the AZURE_* environment variables (see `credentials`).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod credentials;
mod env_overrides;
mod environment;
mod sources;
mod validation;

pub use credentials::{
    load_credentials, Credentials, MissingVariables, CLIENT_ID_VAR, CLIENT_SECRET_VAR,
    SUBSCRIPTION_ID_VAR, TENANT_ID_VAR,
};
pub use env_overrides::{apply_env_overrides, EnvSource, MapEnvSource, StdEnvSource, ENV_PREFIX};
pub use environment::{CloudEndpoints, CloudEnvironment};
pub use sources::DEFAULT_CONFIG_PATHS;
pub use validation::{validate_dns_prefix, validate_resource_group_name};

pub const DEFAULT_TEMPLATE_URI: &str = "https://raw.githubusercontent.com/Azure-Samples/resource-manager-go-template-deployment/master/vmDeploymentTemplate.json";
pub const DEFAULT_PARAMETERS_URI: &str = "https://raw.githubusercontent.com/Azure-Samples/resource-manager-go-template-deployment/master/vmDeploymentParameter.json";
pub const DEFAULT_CONTENT_VERSION: &str = "1.0.0.0";

/// Main deployment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub parameters: ParametersConfig,

    #[serde(default)]
    pub teardown: TeardownConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cloud selection and endpoint overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub environment: CloudEnvironment,

    /// Overrides the environment's login authority (e.g. a local mock)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_host: Option<String>,

    /// Overrides the environment's resource manager endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_manager_endpoint: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            environment: CloudEnvironment::default(),
            authority_host: None,
            resource_manager_endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AzureConfig {
    /// Endpoints of the selected cloud with any overrides applied.
    pub fn endpoints(&self) -> CloudEndpoints {
        let mut endpoints = self.environment.endpoints();
        if let Some(host) = &self.authority_host {
            endpoints.authority_host = host.clone();
        }
        if let Some(endpoint) = &self.resource_manager_endpoint {
            endpoints.resource_manager = endpoint.clone();
        }
        endpoints
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What gets deployed and where
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub resource_group: String,
    pub location: String,
    pub name: String,
    pub dns_prefix: String,
    pub vm_name: String,
    /// Login name shown in the ssh connection hint
    pub admin_username: String,
    /// Run the dry-run validation before deploying
    pub validate: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            resource_group: "your-azure-sample-group".to_string(),
            location: "westus".to_string(),
            name: "azure-sample".to_string(),
            dns_prefix: "sample-dns-prefix".to_string(),
            vm_name: "azure-deployment-sample-vm".to_string(),
            admin_username: "azureSample".to_string(),
            validate: true,
        }
    }
}

/// Where the template comes from. A local file is embedded inline in the
/// request; a link is fetched by the resource manager itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum TemplateConfig {
    File {
        path: String,
    },
    Link {
        uri: String,
        #[serde(default = "default_content_version")]
        content_version: String,
    },
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig::File {
            path: "vmDeploymentTemplate.json".to_string(),
        }
    }
}

impl TemplateConfig {
    pub fn default_link() -> Self {
        TemplateConfig::Link {
            uri: DEFAULT_TEMPLATE_URI.to_string(),
            content_version: default_content_version(),
        }
    }
}

/// Where the parameter values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ParametersConfig {
    Inline {
        /// Extra static values, wrapped as `{"value": ...}` on build
        #[serde(default)]
        values: serde_json::Map<String, serde_json::Value>,
        /// Optional JSON object file with more values
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Public key path; defaults to ~/.ssh/id_rsa.pub
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_key_path: Option<String>,
    },
    Link {
        uri: String,
        #[serde(default = "default_content_version")]
        content_version: String,
    },
}

impl Default for ParametersConfig {
    fn default() -> Self {
        ParametersConfig::Inline {
            values: serde_json::Map::new(),
            file: None,
            ssh_key_path: None,
        }
    }
}

impl ParametersConfig {
    pub fn default_link() -> Self {
        ParametersConfig::Link {
            uri: DEFAULT_PARAMETERS_URI.to_string(),
            content_version: default_content_version(),
        }
    }
}

fn default_content_version() -> String {
    DEFAULT_CONTENT_VERSION.to_string()
}

/// When the resource group is deleted after a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownConfig {
    #[serde(default)]
    pub policy: TeardownPolicy,
    /// Delete the group when a step after group creation fails
    #[serde(default)]
    pub on_error: bool,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            policy: TeardownPolicy::default(),
            on_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Ask on the terminal after a successful deployment
    #[default]
    Prompt,
    Always,
    Never,
}

impl std::fmt::Display for TeardownPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownPolicy::Prompt => write!(f, "prompt"),
            TeardownPolicy::Always => write!(f, "always"),
            TeardownPolicy::Never => write!(f, "never"),
        }
    }
}

impl std::str::FromStr for TeardownPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "prompt" | "ask" => Ok(TeardownPolicy::Prompt),
            "always" | "yes" => Ok(TeardownPolicy::Always),
            "never" | "no" => Ok(TeardownPolicy::Never),
            _ => anyhow::bail!(
                "Unsupported teardown policy: {}. Supported: prompt, always, never",
                s
            ),
        }
    }
}

/// Long-running operation polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl DeployConfig {
    /// Load configuration against an explicit environment (useful for testing)
    pub fn load_with_env<E: EnvSource>(env: &E) -> Result<Self> {
        sources::load_config(env)
    }

    /// Load from a specific file (CLI --config flag); env overrides still apply
    pub fn load_from_path_with_env<E: EnvSource>(path: impl AsRef<Path>, env: &E) -> Result<Self> {
        sources::load_from_file_path(path, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_policy_from_str() {
        assert_eq!(
            "prompt".parse::<TeardownPolicy>().unwrap(),
            TeardownPolicy::Prompt
        );
        assert_eq!(
            "ALWAYS".parse::<TeardownPolicy>().unwrap(),
            TeardownPolicy::Always
        );
        assert_eq!("no".parse::<TeardownPolicy>().unwrap(), TeardownPolicy::Never);
        assert!("sometimes".parse::<TeardownPolicy>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = DeployConfig::default();
        assert_eq!(config.deployment.location, "westus");
        assert_eq!(config.deployment.dns_prefix, "sample-dns-prefix");
        assert!(config.deployment.validate);
        assert!(!config.teardown.on_error);
        assert_eq!(config.teardown.policy, TeardownPolicy::Prompt);
        assert_eq!(config.polling.interval(), Duration::from_secs(5));
        assert!(matches!(config.template, TemplateConfig::File { .. }));
        assert!(matches!(config.parameters, ParametersConfig::Inline { .. }));
    }

    #[test]
    fn test_parse_tagged_sources() {
        let config: DeployConfig = toml::from_str(
            r#"
            [template]
            source = "link"
            uri = "https://example.com/template.json"

            [parameters]
            source = "inline"
            ssh_key_path = "/tmp/key.pub"

            [parameters.values]
            adminUsername = "ops"
            tags = { team = "infra" }
            "#,
        )
        .unwrap();

        assert_eq!(
            config.template,
            TemplateConfig::Link {
                uri: "https://example.com/template.json".to_string(),
                content_version: DEFAULT_CONTENT_VERSION.to_string(),
            }
        );
        match config.parameters {
            ParametersConfig::Inline {
                values,
                ssh_key_path,
                ..
            } => {
                assert_eq!(values["adminUsername"], "ops");
                assert_eq!(values["tags"]["team"], "infra");
                assert_eq!(ssh_key_path.as_deref(), Some("/tmp/key.pub"));
            }
            other => panic!("expected inline parameters, got {:?}", other),
        }
        // Untouched sections fall back to defaults
        assert_eq!(config.deployment.name, "azure-sample");
    }

    #[test]
    fn test_endpoint_overrides() {
        let azure = AzureConfig {
            resource_manager_endpoint: Some("http://127.0.0.1:9000".to_string()),
            ..Default::default()
        };
        let endpoints = azure.endpoints();
        assert_eq!(endpoints.resource_manager, "http://127.0.0.1:9000");
        assert_eq!(endpoints.authority_host, "https://login.microsoftonline.com");
        assert_eq!(endpoints.cloudapp_suffix, "cloudapp.azure.com");
    }
}
