//! Service principal token acquisition (OAuth 2.0 client credentials)

use crate::error::{DeployError, Result};
use crate::http::HttpClient;
use crate::protocol::{TokenErrorResponse, TokenResponse};
use armdeploy_config::{CloudEndpoints, Credentials};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Bearer credential for resource manager calls
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_on
            .as_ref()
            .and_then(as_seconds)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                response
                    .expires_in
                    .as_ref()
                    .and_then(as_seconds)
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|delta| now.checked_add_signed(delta))
            });

        Self {
            token: response.access_token,
            token_type: response
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
        }
    }
}

/// Seconds sent either as a JSON number or a numeric string
fn as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Token endpoint for a tenant: `{authority}/{tenant}/oauth2/token`
pub fn token_url(endpoints: &CloudEndpoints, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/token",
        endpoints.authority_host.trim_end_matches('/'),
        tenant_id
    )
}

/// Exchange the client id/secret for a resource manager token.
#[instrument(skip(http, endpoints, credentials), fields(tenant = %credentials.tenant_id, client = %credentials.client_id))]
pub async fn authenticate<H: HttpClient + ?Sized>(
    http: &H,
    endpoints: &CloudEndpoints,
    credentials: &Credentials,
) -> Result<AccessToken> {
    let url = token_url(endpoints, &credentials.tenant_id);
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", &credentials.client_id)
        .append_pair("client_secret", &credentials.client_secret)
        .append_pair("resource", &endpoints.token_audience)
        .finish();

    debug!("Requesting token from: {}", url);

    let response = http
        .post(
            &url,
            vec![
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body.into_bytes(),
        )
        .await
        .map_err(|e| DeployError::auth(&credentials.tenant_id, format!("{:#}", e)))?;

    if !response.is_success() {
        let reason = match response.json::<TokenErrorResponse>() {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!(
                "HTTP {}: {}",
                response.status,
                response
                    .body_string()
                    .unwrap_or_else(|_| "<binary>".to_string())
            ),
        };
        return Err(DeployError::auth(&credentials.tenant_id, reason));
    }

    let parsed: TokenResponse = response.json().map_err(|e| {
        DeployError::auth(
            &credentials.tenant_id,
            format!("invalid token response: {}", e),
        )
    })?;
    if parsed.access_token.is_empty() {
        return Err(DeployError::auth(
            &credentials.tenant_id,
            "token endpoint returned an empty access_token",
        ));
    }

    let token = AccessToken::from_response(parsed, Utc::now());
    info!(expires_at = ?token.expires_at, "Acquired service principal token");
    Ok(token)
}
