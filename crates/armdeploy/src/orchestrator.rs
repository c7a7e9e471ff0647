//! Deployment run
//!
//! Drives one pass of the state machine:
//!
//! ```text
//! Init -> Authenticated -> GroupReady -> ParametersBuilt -> [Validated] -> Deployed -> [Deleted]
//! ```
//!
//! A failure once the resource group is in place triggers a best-effort
//! teardown when `teardown.on_error` is set. A failed group create-or-update
//! never deletes anything, since the group may predate the run. The original
//! error is always the one returned.

use crate::parameters;
use crate::report;
use armdeploy_arm::protocol::Deployment;
use armdeploy_arm::{
    authenticate, DeployError, DeploymentExtended, HttpClient, ResourceManagerClient, Result,
    ValidationOutcome,
};
use armdeploy_config::{CloudEndpoints, Credentials, DeployConfig, TeardownPolicy};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Last state reached by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    Authenticated,
    GroupReady,
    ParametersBuilt,
    Validated,
    Deployed,
    Deleted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Authenticated => "authenticated",
            Stage::GroupReady => "group-ready",
            Stage::ParametersBuilt => "parameters-built",
            Stage::Validated => "validated",
            Stage::Deployed => "deployed",
            Stage::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stage: Stage,
    pub deployment: Option<DeploymentExtended>,
    pub connection_hint: Option<String>,
}

pub struct Orchestrator<H: HttpClient> {
    client: ResourceManagerClient<H>,
    config: DeployConfig,
    endpoints: CloudEndpoints,
    default_key_path: Option<PathBuf>,
    stage: Stage,
}

impl<H: HttpClient> Orchestrator<H> {
    /// Authenticate and bind a resource manager client to the subscription.
    /// Nothing remote is created here, so a failure needs no cleanup.
    pub async fn connect(http: H, credentials: &Credentials, config: DeployConfig) -> Result<Self> {
        println!("Get credentials and token...");
        let endpoints = config.azure.endpoints();
        let token = authenticate(&http, &endpoints, credentials).await?;

        let client = ResourceManagerClient::new(
            http,
            endpoints.resource_manager.clone(),
            credentials.subscription_id.clone(),
            token,
        )
        .with_polling(config.polling.interval(), config.polling.timeout());

        Ok(Self {
            client,
            config,
            endpoints,
            default_key_path: None,
            stage: Stage::Authenticated,
        })
    }

    /// Key file used when the config names none.
    pub fn with_default_key_path(mut self, path: Option<PathBuf>) -> Self {
        self.default_key_path = path;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Full run: group, request, optional validation, deployment, then the
    /// configured teardown. `confirm_teardown` is asked only for
    /// [`TeardownPolicy::Prompt`].
    pub async fn run<F>(&mut self, confirm_teardown: F) -> Result<RunReport>
    where
        F: FnOnce(&str) -> bool,
    {
        let (deployment, hint) = match self.deploy_steps().await {
            Ok(done) => done,
            Err(err) => return Err(self.fail(err).await),
        };

        let teardown = match self.config.teardown.policy {
            TeardownPolicy::Always => true,
            TeardownPolicy::Never => false,
            TeardownPolicy::Prompt => confirm_teardown(&self.config.deployment.resource_group),
        };
        if teardown {
            self.teardown().await?;
        }

        Ok(RunReport {
            stage: self.stage,
            deployment: Some(deployment),
            connection_hint: Some(hint),
        })
    }

    /// Stop after the dry run; nothing is deployed.
    pub async fn validate_only(&mut self) -> Result<RunReport> {
        match self.validate_steps().await {
            Ok(()) => Ok(RunReport {
                stage: self.stage,
                deployment: None,
                connection_hint: None,
            }),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn validate_steps(&mut self) -> Result<()> {
        self.ensure_resource_group().await?;
        let request = self.build_request()?;
        self.validate(&request).await
    }

    async fn deploy_steps(&mut self) -> Result<(DeploymentExtended, String)> {
        self.ensure_resource_group().await?;
        let request = self.build_request()?;
        if self.config.deployment.validate {
            self.validate(&request).await?;
        } else {
            info!("Skipping template validation");
        }
        let deployment = self.deploy(&request).await?;

        let deploy_cfg = &self.config.deployment;
        let hint = report::connection_hint(
            &deploy_cfg.admin_username,
            &deploy_cfg.dns_prefix,
            &deploy_cfg.location,
            &self.endpoints.cloudapp_suffix,
        );
        println!("{}", hint);
        Ok((deployment, hint))
    }

    async fn ensure_resource_group(&mut self) -> Result<()> {
        println!("Create resource group...");
        let deploy_cfg = &self.config.deployment;
        self.client
            .create_or_update_group(&deploy_cfg.resource_group, &deploy_cfg.location)
            .await?;
        self.stage = Stage::GroupReady;
        Ok(())
    }

    fn build_request(&mut self) -> Result<Deployment> {
        println!("Build deployment parameters");
        let template = parameters::build_template(&self.config.template)?;
        let params = parameters::build_parameters(&self.config, self.default_key_path.as_deref())?;
        self.stage = Stage::ParametersBuilt;
        Ok(Deployment::new(template, params))
    }

    async fn validate(&mut self, request: &Deployment) -> Result<()> {
        println!("Validate deployment template");
        let deploy_cfg = &self.config.deployment;
        match self
            .client
            .validate_deployment(&deploy_cfg.resource_group, &deploy_cfg.name, request)
            .await?
        {
            ValidationOutcome::Valid => {
                println!("Deployment is validated! Template is syntactically correct");
                self.stage = Stage::Validated;
                Ok(())
            }
            ValidationOutcome::Invalid(detail) => {
                Err(DeployError::validation_failed(&deploy_cfg.name, detail))
            }
        }
    }

    async fn deploy(&mut self, request: &Deployment) -> Result<DeploymentExtended> {
        println!("Deploying...");
        let deploy_cfg = &self.config.deployment;
        let result = self
            .client
            .create_or_update_deployment(&deploy_cfg.resource_group, &deploy_cfg.name, request)
            .await?;
        println!("Finished deployment");
        self.stage = Stage::Deployed;
        Ok(result)
    }

    /// Delete the resource group and wait for it to disappear.
    pub async fn teardown(&mut self) -> Result<()> {
        println!("Delete resource group...");
        self.client
            .delete_group(&self.config.deployment.resource_group)
            .await?;
        self.stage = Stage::Deleted;
        Ok(())
    }

    /// Best-effort cleanup after `err`. Returns `err` unchanged.
    async fn fail(&mut self, err: DeployError) -> DeployError {
        error!(stage = %self.stage, code = %err.code(), "Run failed");
        if !self.config.teardown.on_error || self.stage < Stage::GroupReady {
            return err;
        }

        let group = self.config.deployment.resource_group.clone();
        warn!(group = %group, "Removing resource group after failure");
        if let Err(cleanup) = self.teardown().await {
            eprintln!("Teardown of resource group '{}' failed: {}", group, cleanup);
            warn!(error = %cleanup, "Teardown after failure did not complete");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armdeploy_arm::HttpResponse;
    use armdeploy_config::{ParametersConfig, TemplateConfig};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Replays queued responses and records (method, url)
    struct ScriptedHttp {
        responses: Mutex<Vec<HttpResponse>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedHttp {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn request(
            &self,
            method: &str,
            url: &str,
            _headers: Vec<(String, String)>,
            _body: Option<Vec<u8>>,
        ) -> anyhow::Result<HttpResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), url.to_string()));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                anyhow::bail!("unexpected request: {} {}", method, url);
            }
            Ok(responses.remove(0))
        }
    }

    fn json(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![],
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn empty(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![],
            body: vec![],
        }
    }

    fn token() -> HttpResponse {
        json(
            200,
            json!({"access_token": "tok", "token_type": "Bearer", "expires_in": 3599}),
        )
    }

    fn group() -> HttpResponse {
        json(
            200,
            json!({
                "name": "rg",
                "location": "westus",
                "properties": {"provisioningState": "Succeeded"}
            }),
        )
    }

    fn succeeded() -> HttpResponse {
        json(200, json!({"properties": {"provisioningState": "Succeeded"}}))
    }

    fn credentials() -> Credentials {
        Credentials {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            subscription_id: "sub".to_string(),
        }
    }

    fn config(template: &NamedTempFile, key: &NamedTempFile) -> DeployConfig {
        let mut config = DeployConfig::default();
        config.template = TemplateConfig::File {
            path: template.path().display().to_string(),
        };
        config.parameters = ParametersConfig::Inline {
            values: Default::default(),
            file: None,
            ssh_key_path: Some(key.path().display().to_string()),
        };
        config.teardown.policy = TeardownPolicy::Never;
        config.polling.interval_secs = 0;
        config
    }

    fn fixtures() -> (NamedTempFile, NamedTempFile) {
        let mut template = NamedTempFile::new().unwrap();
        template
            .write_all(br#"{"contentVersion": "1.0.0.0", "resources": []}"#)
            .unwrap();
        let mut key = NamedTempFile::new().unwrap();
        key.write_all(b"ssh-rsa AAAA test\n").unwrap();
        (template, key)
    }

    fn methods(calls: &[(String, String)]) -> Vec<String> {
        calls.iter().map(|(m, _)| m.clone()).collect()
    }

    async fn orchestrator(
        responses: Vec<HttpResponse>,
        config: DeployConfig,
    ) -> Orchestrator<ScriptedHttp> {
        Orchestrator::connect(ScriptedHttp::new(responses), &credentials(), config)
            .await
            .unwrap()
    }

    fn calls(orch: &Orchestrator<ScriptedHttp>) -> Vec<(String, String)> {
        orch.client.http().calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_happy_path_reaches_deployed() {
        let (template, key) = fixtures();
        let mut orch = orchestrator(
            vec![token(), group(), succeeded(), succeeded()],
            config(&template, &key),
        )
        .await;

        let report = orch.run(|_| panic!("policy is never")).await.unwrap();
        assert_eq!(report.stage, Stage::Deployed);
        let hint = report.connection_hint.unwrap();
        assert!(hint.contains("sample-dns-prefix"));
        assert!(hint.contains("westus"));
        assert_eq!(methods(&calls(&orch)), vec!["POST", "PUT", "POST", "PUT"]);
    }

    #[tokio::test]
    async fn test_skip_validation() {
        let (template, key) = fixtures();
        let mut cfg = config(&template, &key);
        cfg.deployment.validate = false;
        let mut orch = orchestrator(vec![token(), group(), succeeded()], cfg).await;

        let report = orch.run(|_| false).await.unwrap();
        assert_eq!(report.stage, Stage::Deployed);
        assert!(!calls(&orch).iter().any(|(_, url)| url.contains("/validate")));
    }

    #[tokio::test]
    async fn test_validation_failure_tears_down_and_keeps_error() {
        let (template, key) = fixtures();
        let mut cfg = config(&template, &key);
        cfg.teardown.on_error = true;
        let invalid = json!({
            "error": {"code": "InvalidTemplate", "message": "bad", "target": "vmName"}
        });
        let mut orch = orchestrator(
            vec![token(), group(), json(400, invalid), empty(200)],
            cfg,
        )
        .await;

        let err = orch.run(|_| false).await.unwrap_err();
        match err {
            DeployError::ValidationFailed { detail, .. } => {
                assert_eq!(detail.code.as_deref(), Some("InvalidTemplate"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(orch.stage(), Stage::Deleted);
        assert_eq!(calls(&orch).last().unwrap().0, "DELETE");
    }

    #[tokio::test]
    async fn test_failed_teardown_does_not_mask_error() {
        let (template, key) = fixtures();
        let remote = json!({"code": "DeploymentFailed", "message": "boom"});
        let mut cfg = config(&template, &key);
        cfg.deployment.validate = false;
        cfg.teardown.on_error = true;
        let mut orch = orchestrator(
            vec![
                token(),
                group(),
                json(
                    200,
                    json!({"properties": {"provisioningState": "Failed", "error": remote}}),
                ),
                json(403, json!({"error": {"code": "AuthorizationFailed"}})),
            ],
            cfg,
        )
        .await;

        let err = orch.run(|_| false).await.unwrap_err();
        assert!(matches!(err, DeployError::Deployment { .. }));
        assert!(err.to_string().contains("DeploymentFailed"));
        assert_eq!(orch.stage(), Stage::ParametersBuilt);
    }

    #[tokio::test]
    async fn test_no_teardown_when_disabled() {
        let (template, _) = fixtures();
        let missing_key = NamedTempFile::new().unwrap().path().to_path_buf();
        let mut cfg = DeployConfig::default();
        cfg.template = TemplateConfig::File {
            path: template.path().display().to_string(),
        };
        cfg.parameters = ParametersConfig::Inline {
            values: Default::default(),
            file: None,
            ssh_key_path: Some(missing_key.display().to_string()),
        };

        let mut orch = orchestrator(vec![token(), group()], cfg).await;
        let err = orch.run(|_| true).await.unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
        assert_eq!(orch.stage(), Stage::GroupReady);
        assert_eq!(calls(&orch).len(), 2);
    }

    #[tokio::test]
    async fn test_group_failure_never_deletes_existing_group() {
        let (template, key) = fixtures();
        let mut cfg = config(&template, &key);
        cfg.teardown.on_error = true;
        let conflict = json!({
            "error": {"code": "InvalidResourceGroupLocation", "message": "exists in eastus"}
        });
        let mut orch = orchestrator(vec![token(), json(409, conflict)], cfg).await;

        let err = orch.run(|_| true).await.unwrap_err();
        match err {
            DeployError::Provisioning { reason, .. } => {
                assert!(reason.contains("InvalidResourceGroupLocation"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(orch.stage(), Stage::Authenticated);
        assert_eq!(methods(&calls(&orch)), vec!["POST", "PUT"]);
    }

    #[tokio::test]
    async fn test_default_config_keeps_group_after_failure() {
        let (template, key) = fixtures();
        let mut cfg = config(&template, &key);
        cfg.teardown = Default::default();
        cfg.deployment.validate = false;
        let mut orch = orchestrator(
            vec![
                token(),
                group(),
                json(200, json!({"properties": {"provisioningState": "Canceled"}})),
            ],
            cfg,
        )
        .await;

        let err = orch.run(|_| true).await.unwrap_err();
        assert!(matches!(err, DeployError::Deployment { .. }));
        assert_eq!(orch.stage(), Stage::ParametersBuilt);
        assert!(!calls(&orch).iter().any(|(method, _)| method == "DELETE"));
    }

    #[tokio::test]
    async fn test_prompt_policy_asks_with_group_name() {
        let (template, key) = fixtures();
        let mut cfg = config(&template, &key);
        cfg.teardown.policy = TeardownPolicy::Prompt;
        cfg.deployment.validate = false;
        let mut orch = orchestrator(vec![token(), group(), succeeded(), empty(200)], cfg).await;

        let mut asked = None;
        let report = orch
            .run(|group| {
                asked = Some(group.to_string());
                true
            })
            .await
            .unwrap();
        assert_eq!(asked.as_deref(), Some("your-azure-sample-group"));
        assert_eq!(report.stage, Stage::Deleted);
    }

    #[tokio::test]
    async fn test_auth_failure_is_auth_error() {
        let http = ScriptedHttp::new(vec![json(
            400,
            json!({"error": "unauthorized_client", "error_description": "AADSTS700016"}),
        )]);
        let err = Orchestrator::connect(http, &credentials(), DeployConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeployError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_validate_only_does_not_deploy() {
        let (template, key) = fixtures();
        let mut orch = orchestrator(
            vec![token(), group(), succeeded()],
            config(&template, &key),
        )
        .await;

        let report = orch.validate_only().await.unwrap();
        assert_eq!(report.stage, Stage::Validated);
        assert!(report.deployment.is_none());
        assert_eq!(calls(&orch).len(), 3);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Init < Stage::Authenticated);
        assert!(Stage::Validated < Stage::Deployed);
        assert_eq!(Stage::GroupReady.to_string(), "group-ready");
    }
}
