//! Response bodies from the token endpoint and the resource manager

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful client-credentials response. The v1 endpoint sends the
/// expiry fields as strings, v2 as numbers; both are kept raw.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<Value>,
    #[serde(default)]
    pub expires_on: Option<Value>,
}

/// OAuth error body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Structured error used by validate and failed deployments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

/// `{"error": {...}}` envelope returned with 4xx/5xx
#[derive(Debug, Clone, Deserialize)]
pub struct CloudError {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Option<ResourceGroupProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPropertiesExtended {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub outputs: Option<Value>,
    /// Kept raw so it can be surfaced verbatim
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentExtended {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Option<DeploymentPropertiesExtended>,
}

impl DeploymentExtended {
    pub fn provisioning_state(&self) -> ProvisioningState {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
            .map(ProvisioningState::parse)
            .unwrap_or(ProvisioningState::InProgress)
    }

    pub fn raw_state(&self) -> &str {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn outputs(&self) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.outputs.as_ref())
    }
}

/// Validate answers 200 with either `properties` or `error`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResult {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub properties: Option<DeploymentPropertiesExtended>,
}

/// Collapsed view of the many provisioning state strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Succeeded,
    Failed,
    Canceled,
    /// Accepted, Running, Creating, ...
    InProgress,
}

impl ProvisioningState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "succeeded" => ProvisioningState::Succeeded,
            "failed" => ProvisioningState::Failed,
            "canceled" | "cancelled" => ProvisioningState::Canceled,
            _ => ProvisioningState::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProvisioningState::InProgress)
    }
}
