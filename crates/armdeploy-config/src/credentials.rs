// Service principal credentials
//
// Read from the standard AZURE_* variables (no ARMDEPLOY_ prefix). All four
// must be present and non-blank before any network call is made.

use crate::env_overrides::EnvSource;
use thiserror::Error;

pub const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
pub const SUBSCRIPTION_ID_VAR: &str = "AZURE_SUBSCRIPTION_ID";

/// Credentials for the client-credentials flow, immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Every required variable that was unset or blank, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing environment variables [{}]", .names.join(", "))]
pub struct MissingVariables {
    pub names: Vec<&'static str>,
}

/// Load the four credential variables, reporting all missing ones at once.
pub fn load_credentials<E: EnvSource>(env: &E) -> Result<Credentials, MissingVariables> {
    let mut missing = Vec::new();
    let mut read = |name: &'static str| -> String {
        match env.get_raw(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        }
    };

    let tenant_id = read(TENANT_ID_VAR);
    let client_id = read(CLIENT_ID_VAR);
    let client_secret = read(CLIENT_SECRET_VAR);
    let subscription_id = read(SUBSCRIPTION_ID_VAR);

    if !missing.is_empty() {
        return Err(MissingVariables { names: missing });
    }

    Ok(Credentials {
        tenant_id,
        client_id,
        client_secret,
        subscription_id,
    })
}
