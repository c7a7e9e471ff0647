//! Resource manager REST client
//!
//! Covers the four calls a template deployment needs: resource group
//! create-or-update and delete, deployment validate and create-or-update.
//! Long-running operations are awaited by polling.

use crate::auth::AccessToken;
use crate::error::{DeployError, Result};
use crate::http::{HttpClient, HttpResponse};
use crate::protocol::{
    CloudError, Deployment, DeploymentExtended, ErrorDetail, ProvisioningState, ResourceGroup,
    ResourceGroupRequest, ValidateResult,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

pub const API_VERSION: &str = "2021-04-01";

/// Outcome of a dry-run validation. A rejected template is a normal answer,
/// not a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(ErrorDetail),
}

/// Resource manager client for one subscription
///
/// Generic over HttpClient implementation so tests can replay responses.
pub struct ResourceManagerClient<T: HttpClient> {
    http: T,
    /// e.g. "https://management.azure.com"
    base_url: String,
    subscription_id: String,
    token: AccessToken,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<T: HttpClient> ResourceManagerClient<T> {
    pub fn new(
        http: T,
        base_url: impl Into<String>,
        subscription_id: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            token,
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn http(&self) -> &T {
        &self.http
    }

    fn group_url(&self, group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}?api-version={}",
            self.base_url, self.subscription_id, group, API_VERSION
        )
    }

    fn deployment_url(&self, group: &str, name: &str, action: Option<&str>) -> String {
        let action = action.map(|a| format!("/{}", a)).unwrap_or_default();
        format!(
            "{}/subscriptions/{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}{}?api-version={}",
            self.base_url, self.subscription_id, group, name, action, API_VERSION
        )
    }

    fn headers(&self, json_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                "Authorization".to_string(),
                self.token.authorization_header(),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if json_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers
    }

    fn next_delay(&self, response: &HttpResponse) -> Duration {
        response.retry_after().unwrap_or(self.poll_interval)
    }

    /// Create the group or update its location tag; safe to repeat.
    ///
    /// Calls: PUT /subscriptions/{sub}/resourcegroups/{name}
    #[instrument(skip(self))]
    pub async fn create_or_update_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup> {
        let url = self.group_url(name);
        let body = serde_json::to_vec(&ResourceGroupRequest {
            location: location.to_string(),
        })
        .map_err(|e| DeployError::provisioning(name, "create", e.to_string()))?;

        let response = self
            .http
            .put(&url, self.headers(true), body)
            .await
            .map_err(|e| DeployError::http(&url, &e))?;

        if !response.is_success() {
            return Err(DeployError::provisioning(
                name,
                "create",
                remote_error(&response),
            ));
        }

        let group: ResourceGroup = response
            .json()
            .map_err(|e| DeployError::provisioning(name, "create", e.to_string()))?;
        debug!(
            state = ?group.properties.as_ref().and_then(|p| p.provisioning_state.as_deref()),
            "Resource group ready"
        );
        Ok(group)
    }

    /// Delete the group and wait until the resource manager reports it gone.
    ///
    /// Calls: DELETE /subscriptions/{sub}/resourcegroups/{name}
    #[instrument(skip(self))]
    pub async fn delete_group(&self, name: &str) -> Result<()> {
        let url = self.group_url(name);
        let response = self
            .http
            .delete(&url, self.headers(false))
            .await
            .map_err(|e| DeployError::http(&url, &e))?;

        match response.status {
            200 | 204 => Ok(()),
            404 => {
                info!("Resource group already absent");
                Ok(())
            }
            202 => {
                let Some(location) = response.header("location").map(str::to_string) else {
                    return Err(DeployError::provisioning(
                        name,
                        "delete",
                        "accepted without a Location header to poll",
                    ));
                };
                let last = self
                    .poll_location(&location, self.next_delay(&response))
                    .await
                    .map_err(|e| DeployError::provisioning(name, "delete", e))?;
                if last.is_success() || last.status == 404 {
                    Ok(())
                } else {
                    Err(DeployError::provisioning(
                        name,
                        "delete",
                        remote_error(&last),
                    ))
                }
            }
            _ => Err(DeployError::provisioning(
                name,
                "delete",
                remote_error(&response),
            )),
        }
    }

    /// Dry-run the deployment.
    ///
    /// Calls: POST .../deployments/{name}/validate
    #[instrument(skip(self, deployment))]
    pub async fn validate_deployment(
        &self,
        group: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<ValidationOutcome> {
        let url = self.deployment_url(group, name, Some("validate"));
        let body = serde_json::to_vec(deployment)
            .map_err(|e| DeployError::deployment(name, e.to_string()))?;

        let mut response = self
            .http
            .post(&url, self.headers(true), body)
            .await
            .map_err(|e| DeployError::http(&url, &e))?;

        // Newer API versions validate asynchronously
        if response.status == 202 {
            let Some(location) = response.header("location").map(str::to_string) else {
                return Err(DeployError::deployment(
                    name,
                    "validation accepted without a Location header to poll",
                ));
            };
            response = self
                .poll_location(&location, self.next_delay(&response))
                .await
                .map_err(|e| DeployError::deployment(name, e))?;
        }

        match response.status {
            200..=299 => {
                if response.body.is_empty() {
                    return Ok(ValidationOutcome::Valid);
                }
                let result: ValidateResult = response
                    .json()
                    .map_err(|e| DeployError::deployment(name, e.to_string()))?;
                Ok(match result.error {
                    Some(detail) => ValidationOutcome::Invalid(detail),
                    None => ValidationOutcome::Valid,
                })
            }
            400 => match response.json::<CloudError>() {
                Ok(cloud) => Ok(ValidationOutcome::Invalid(cloud.error)),
                Err(_) => Err(DeployError::deployment(name, remote_error(&response))),
            },
            _ => Err(DeployError::deployment(name, remote_error(&response))),
        }
    }

    /// Fetch the current state of a deployment.
    ///
    /// Calls: GET .../deployments/{name}
    pub async fn get_deployment(&self, group: &str, name: &str) -> Result<DeploymentExtended> {
        let url = self.deployment_url(group, name, None);
        let response = self
            .http
            .get(&url, self.headers(false))
            .await
            .map_err(|e| DeployError::http(&url, &e))?;

        if !response.is_success() {
            return Err(DeployError::deployment(name, remote_error(&response)));
        }
        response
            .json()
            .map_err(|e| DeployError::deployment(name, e.to_string()))
    }

    /// Submit the deployment and wait for a terminal provisioning state.
    ///
    /// Calls: PUT .../deployments/{name}, then GET until done
    #[instrument(skip(self, deployment))]
    pub async fn create_or_update_deployment(
        &self,
        group: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<DeploymentExtended> {
        let url = self.deployment_url(group, name, None);
        let body = serde_json::to_vec(deployment)
            .map_err(|e| DeployError::deployment(name, e.to_string()))?;

        let response = self
            .http
            .put(&url, self.headers(true), body)
            .await
            .map_err(|e| DeployError::http(&url, &e))?;

        if !response.is_success() {
            return Err(DeployError::deployment(name, remote_error(&response)));
        }

        let mut current: DeploymentExtended = if response.body.is_empty() {
            DeploymentExtended::default()
        } else {
            response
                .json()
                .map_err(|e| DeployError::deployment(name, e.to_string()))?
        };
        let mut delay = self.next_delay(&response);
        let started = Instant::now();

        loop {
            match current.provisioning_state() {
                ProvisioningState::Succeeded => {
                    info!("Deployment succeeded");
                    return Ok(current);
                }
                ProvisioningState::Failed | ProvisioningState::Canceled => {
                    let payload = current
                        .properties
                        .as_ref()
                        .and_then(|p| p.error.as_ref())
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("provisioning state {}", current.raw_state()));
                    return Err(DeployError::deployment(name, payload));
                }
                ProvisioningState::InProgress => {}
            }

            if started.elapsed() + delay > self.poll_timeout {
                return Err(DeployError::deployment(
                    name,
                    format!(
                        "timed out after {}s waiting for completion (last state: {})",
                        self.poll_timeout.as_secs(),
                        current.raw_state()
                    ),
                ));
            }

            debug!(
                state = current.raw_state(),
                delay_ms = delay.as_millis() as u64,
                "Deployment in progress"
            );
            tokio::time::sleep(delay).await;
            current = self.get_deployment(group, name).await?;
            delay = self.poll_interval;
        }
    }

    /// Follow an async-operation `Location` until it stops answering 202.
    /// Returns the first non-202 response.
    async fn poll_location(
        &self,
        location: &str,
        first_delay: Duration,
    ) -> std::result::Result<HttpResponse, String> {
        let started = Instant::now();
        let mut delay = first_delay;

        loop {
            if started.elapsed() + delay > self.poll_timeout {
                return Err(format!(
                    "timed out after {}s waiting for {}",
                    self.poll_timeout.as_secs(),
                    location
                ));
            }
            tokio::time::sleep(delay).await;

            let response = self
                .http
                .get(location, self.headers(false))
                .await
                .map_err(|e| format!("{:#}", e))?;
            if response.status != 202 {
                return Ok(response);
            }
            delay = self.next_delay(&response);
        }
    }
}

/// Remote error body as received, falling back to the status line.
fn remote_error(response: &HttpResponse) -> String {
    let body = response
        .body_string()
        .unwrap_or_else(|_| "<binary>".to_string());
    if body.trim().is_empty() {
        format!("HTTP {}", response.status)
    } else {
        format!("HTTP {}: {}", response.status, body)
    }
}
