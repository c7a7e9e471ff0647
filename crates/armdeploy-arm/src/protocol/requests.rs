//! Request bodies sent to the resource manager

use serde::Serialize;
use serde_json::{Map, Value};

/// Body of a resource group create-or-update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroupRequest {
    pub location: String,
}

/// Remote document reference (`templateLink` / `parametersLink`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLink {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_version: Option<String>,
}

/// Exactly one of `template` / `templateLink` ends up in the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TemplateSource {
    #[serde(rename = "template")]
    Inline(Map<String, Value>),
    #[serde(rename = "templateLink")]
    Link(ContentLink),
}

/// Exactly one of `parameters` / `parametersLink` ends up in the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParametersSource {
    #[serde(rename = "parameters")]
    Inline(Parameters),
    #[serde(rename = "parametersLink")]
    Link(ContentLink),
}

/// Template parameter values. Every entry has the shape
/// `{key: {"value": value}}`; `insert` is the only way in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` wrapped as `{"value": value}`, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let mut wrapper = Map::new();
        wrapper.insert("value".to_string(), value.into());
        self.0.insert(key.into(), Value::Object(wrapper));
    }

    /// The unwrapped value for `key`
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).and_then(|entry| entry.get("value"))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Only incremental mode is ever sent; complete mode would delete resources
/// missing from the template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DeploymentMode {
    #[default]
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentProperties {
    #[serde(flatten)]
    pub template: TemplateSource,
    #[serde(flatten)]
    pub parameters: ParametersSource,
    pub mode: DeploymentMode,
}

/// Body of validate and create-or-update deployment calls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub properties: DeploymentProperties,
}

impl Deployment {
    pub fn new(template: TemplateSource, parameters: ParametersSource) -> Self {
        Self {
            properties: DeploymentProperties {
                template,
                parameters,
                mode: DeploymentMode::Incremental,
            },
        }
    }
}
