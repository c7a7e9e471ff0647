//! Template and parameter sources for a deployment request
//!
//! Local templates are read from disk and embedded inline. Local parameters
//! are merged in this order (later wins): parameters file, static values from
//! config, then `dnsLabelPrefix`, `vmName` and `sshKeyData`.

use armdeploy_arm::protocol::{ContentLink, Parameters, ParametersSource, TemplateSource};
use armdeploy_arm::{DeployError, Result};
use armdeploy_config::{DeployConfig, EnvSource, ParametersConfig, TemplateConfig};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DNS_LABEL_PREFIX: &str = "dnsLabelPrefix";
pub const VM_NAME: &str = "vmName";
pub const SSH_KEY_DATA: &str = "sshKeyData";

/// Read a JSON document that must be an object.
pub fn parse_json_from_file(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DeployError::io(path.display().to_string(), e))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DeployError::io(
            path.display().to_string(),
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
        Err(e) => Err(DeployError::io(path.display().to_string(), e)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `$HOME/.ssh/id_rsa.pub`, falling back to `USERPROFILE` on Windows.
pub fn default_ssh_key_path<E: EnvSource>(env: &E) -> Option<PathBuf> {
    env.get_raw("HOME")
        .or_else(|| env.get_raw("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(|home| Path::new(&home).join(".ssh").join("id_rsa.pub"))
}

/// Public key file contents, byte for byte (trailing newline included).
pub fn read_ssh_key(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| DeployError::io(path.display().to_string(), e))
}

/// Resolve the template source. Prints which one is used.
pub fn build_template(template: &TemplateConfig) -> Result<TemplateSource> {
    println!("\tGet template");
    match template {
        TemplateConfig::File { path } => {
            println!("\tUsing local template");
            let body = parse_json_from_file(Path::new(path))?;
            debug!(path = %path, keys = body.len(), "Loaded template");
            Ok(TemplateSource::Inline(body))
        }
        TemplateConfig::Link {
            uri,
            content_version,
        } => {
            println!("\tUsing template link");
            Ok(TemplateSource::Link(ContentLink {
                uri: uri.clone(),
                content_version: Some(content_version.clone()),
            }))
        }
    }
}

/// Resolve the parameters source. For a remote link nothing is read locally.
///
/// `default_key_path` is used when the config names no key file.
pub fn build_parameters(
    config: &DeployConfig,
    default_key_path: Option<&Path>,
) -> Result<ParametersSource> {
    println!("\tGet parameters");
    match &config.parameters {
        ParametersConfig::Link {
            uri,
            content_version,
        } => {
            println!("\tUsing parameter link");
            Ok(ParametersSource::Link(ContentLink {
                uri: uri.clone(),
                content_version: Some(content_version.clone()),
            }))
        }
        ParametersConfig::Inline {
            values,
            file,
            ssh_key_path,
        } => {
            println!("\tUsing local parameters");
            let mut params = Parameters::new();

            if let Some(file) = file {
                for (key, value) in parameter_file_values(Path::new(file))? {
                    params.insert(key, value);
                }
            }
            for (key, value) in values {
                params.insert(key.clone(), value.clone());
            }

            params.insert(DNS_LABEL_PREFIX, config.deployment.dns_prefix.clone());
            params.insert(VM_NAME, config.deployment.vm_name.clone());

            let key_path = match ssh_key_path {
                Some(path) => PathBuf::from(path),
                None => default_key_path.map(Path::to_path_buf).ok_or_else(|| {
                    DeployError::config(
                        "No ssh public key path configured and no home directory to default to",
                    )
                })?,
            };
            params.insert(SSH_KEY_DATA, read_ssh_key(&key_path)?);

            debug!(keys = ?params.keys().collect::<Vec<_>>(), "Built parameters");
            Ok(ParametersSource::Inline(params))
        }
    }
}

/// Values from a parameters file. Accepts either a plain `{name: value}`
/// object or a deployment parameters document (`{"parameters": {name:
/// {"value": ...}}}`), whose entries are unwrapped.
fn parameter_file_values(path: &Path) -> Result<Vec<(String, Value)>> {
    let document = parse_json_from_file(path)?;

    let is_parameters_document = document.contains_key("$schema")
        && matches!(document.get("parameters"), Some(Value::Object(_)));
    if !is_parameters_document {
        return Ok(document.into_iter().collect());
    }

    let Some(Value::Object(entries)) = document.get("parameters") else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|(key, entry)| match entry.get("value") {
            Some(value) => Ok((key.clone(), value.clone())),
            None => Err(DeployError::io(
                path.display().to_string(),
                format!("parameter '{}' has no \"value\"", key),
            )),
        })
        .collect()
}
