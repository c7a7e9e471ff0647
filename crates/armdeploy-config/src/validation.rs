// Configuration validation
//
// Catches values the resource manager would reject anyway, before we spend a
// token exchange on them.

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &DeployConfig) -> Result<()> {
    validate_azure_config(&config.azure)?;
    validate_deployment_config(&config.deployment)?;
    validate_template_config(&config.template)?;
    validate_parameters_config(&config.parameters)?;
    validate_polling_config(&config.polling)?;
    Ok(())
}

fn validate_azure_config(config: &AzureConfig) -> Result<()> {
    if config.request_timeout_secs == 0 {
        bail!("azure.request_timeout_secs must be greater than 0");
    }

    for (field, value) in [
        ("azure.authority_host", &config.authority_host),
        ("azure.resource_manager_endpoint", &config.resource_manager_endpoint),
    ] {
        if let Some(url) = value {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                bail!("{} must be an http(s) URL, got '{}'", field, url);
            }
            if url.starts_with("http://") {
                warn!(field, url = %url, "plain-http endpoint override; credentials sent unencrypted");
            }
        }
    }

    Ok(())
}

fn validate_deployment_config(config: &DeploymentConfig) -> Result<()> {
    validate_resource_group_name(&config.resource_group)
        .map_err(|e| anyhow::anyhow!("deployment.resource_group: {}", e))?;

    if config.location.trim().is_empty() {
        bail!("deployment.location must not be empty");
    }

    if config.name.is_empty() || config.name.len() > 64 {
        bail!("deployment.name must be 1-64 characters");
    }
    if !config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'))
    {
        bail!("deployment.name may only contain letters, digits, '-', '_', '.', '(' and ')'");
    }

    validate_dns_prefix(&config.dns_prefix)
        .map_err(|e| anyhow::anyhow!("deployment.dns_prefix: {}", e))?;

    if config.admin_username.is_empty() {
        bail!("deployment.admin_username must not be empty");
    }

    Ok(())
}

/// Resource group names: 1-90 chars of letters, digits, '-', '_', '.', '(' and
/// ')', not ending in '.'.
pub fn validate_resource_group_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Resource group name cannot be empty".to_string());
    }
    if name.len() > 90 {
        return Err("Resource group name must be at most 90 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'))
    {
        return Err(
            "Resource group name may only contain letters, digits, '-', '_', '.', '(' and ')'"
                .to_string(),
        );
    }
    if name.ends_with('.') {
        return Err("Resource group name cannot end with a period".to_string());
    }
    Ok(())
}

/// DNS labels: 3-63 lowercase letters, digits and hyphens, starting with a
/// letter and not ending with a hyphen.
pub fn validate_dns_prefix(prefix: &str) -> std::result::Result<(), String> {
    if prefix.len() < 3 || prefix.len() > 63 {
        return Err("DNS prefix must be 3-63 characters".to_string());
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(
            "DNS prefix must contain only lowercase letters, numbers, and hyphens".to_string(),
        );
    }
    if !prefix.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("DNS prefix must start with a letter".to_string());
    }
    if prefix.ends_with('-') {
        return Err("DNS prefix cannot end with a hyphen".to_string());
    }
    Ok(())
}

fn validate_template_config(config: &TemplateConfig) -> Result<()> {
    match config {
        TemplateConfig::File { path } => {
            if path.is_empty() {
                bail!("template.path must not be empty");
            }
        }
        TemplateConfig::Link {
            uri,
            content_version,
        } => validate_link("template", uri, content_version)?,
    }
    Ok(())
}

fn validate_parameters_config(config: &ParametersConfig) -> Result<()> {
    match config {
        ParametersConfig::Inline {
            file, ssh_key_path, ..
        } => {
            if matches!(file.as_deref(), Some("")) {
                bail!("parameters.file must not be empty when set");
            }
            if matches!(ssh_key_path.as_deref(), Some("")) {
                bail!("parameters.ssh_key_path must not be empty when set");
            }
        }
        ParametersConfig::Link {
            uri,
            content_version,
        } => validate_link("parameters", uri, content_version)?,
    }
    Ok(())
}

fn validate_link(section: &str, uri: &str, content_version: &str) -> Result<()> {
    if uri.is_empty() {
        bail!("{}.uri must not be empty", section);
    }
    if !uri.starts_with("https://") {
        if uri.starts_with("http://") {
            warn!(section, uri, "linked document is not served over https");
        } else {
            bail!("{}.uri must be an http(s) URL, got '{}'", section, uri);
        }
    }
    if content_version.is_empty() {
        bail!("{}.content_version must not be empty", section);
    }
    Ok(())
}

fn validate_polling_config(config: &PollingConfig) -> Result<()> {
    if config.interval_secs == 0 {
        bail!("polling.interval_secs must be greater than 0");
    }
    if config.timeout_secs == 0 {
        bail!("polling.timeout_secs must be greater than 0");
    }
    if config.timeout_secs < config.interval_secs {
        warn!(
            interval_secs = config.interval_secs,
            timeout_secs = config.timeout_secs,
            "polling.timeout_secs is shorter than one poll interval"
        );
    }
    Ok(())
}
