// Cloud environments and their well-known endpoints
//
// Each sovereign cloud has its own login authority, resource manager and
// public DNS zone for VM labels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudEnvironment {
    #[default]
    Public,
    China,
    UsGovernment,
}

/// Resolved endpoints for one cloud. Hosts carry no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEndpoints {
    pub authority_host: String,
    pub resource_manager: String,
    /// `resource` requested in the client-credentials exchange
    pub token_audience: String,
    pub cloudapp_suffix: String,
}

impl CloudEnvironment {
    pub fn endpoints(&self) -> CloudEndpoints {
        match self {
            CloudEnvironment::Public => CloudEndpoints {
                authority_host: "https://login.microsoftonline.com".to_string(),
                resource_manager: "https://management.azure.com".to_string(),
                token_audience: "https://management.azure.com/".to_string(),
                cloudapp_suffix: "cloudapp.azure.com".to_string(),
            },
            CloudEnvironment::China => CloudEndpoints {
                authority_host: "https://login.chinacloudapi.cn".to_string(),
                resource_manager: "https://management.chinacloudapi.cn".to_string(),
                token_audience: "https://management.chinacloudapi.cn/".to_string(),
                cloudapp_suffix: "cloudapp.chinacloudapi.cn".to_string(),
            },
            CloudEnvironment::UsGovernment => CloudEndpoints {
                authority_host: "https://login.microsoftonline.us".to_string(),
                resource_manager: "https://management.usgovcloudapi.net".to_string(),
                token_audience: "https://management.usgovcloudapi.net/".to_string(),
                cloudapp_suffix: "cloudapp.usgovcloudapi.net".to_string(),
            },
        }
    }
}

impl std::fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudEnvironment::Public => write!(f, "public"),
            CloudEnvironment::China => write!(f, "china"),
            CloudEnvironment::UsGovernment => write!(f, "usgovernment"),
        }
    }
}

impl std::str::FromStr for CloudEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "public" | "azurecloud" => Ok(CloudEnvironment::Public),
            "china" | "azurechinacloud" => Ok(CloudEnvironment::China),
            "usgovernment" | "usgov" | "azureusgovernment" => Ok(CloudEnvironment::UsGovernment),
            _ => anyhow::bail!(
                "Unsupported cloud environment: {}. Supported: public, china, usgovernment",
                s
            ),
        }
    }
}
