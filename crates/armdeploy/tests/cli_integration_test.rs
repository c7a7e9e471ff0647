use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 4] = [
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_CLIENT_SECRET",
    "AZURE_SUBSCRIPTION_ID",
];

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(name)
}

/// Binary with a clean environment, run from an empty directory
fn armdeploy(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_armdeploy"));
    cmd.env_clear()
        .current_dir(workdir.path())
        .env("HOME", workdir.path())
        .env("NO_COLOR", "1");
    cmd
}

/// Environment pointing both endpoints at the mock server
fn with_mock_env<'a>(cmd: &'a mut Command, server: &MockServer) -> &'a mut Command {
    cmd.env("AZURE_TENANT_ID", "tenant")
        .env("AZURE_CLIENT_ID", "client")
        .env("AZURE_CLIENT_SECRET", "secret")
        .env("AZURE_SUBSCRIPTION_ID", "sub")
        .env("ARMDEPLOY_AUTHORITY_HOST", server.base_url())
        .env("ARMDEPLOY_RESOURCE_MANAGER_ENDPOINT", server.base_url())
        .env(
            "ARMDEPLOY_TEMPLATE_PATH",
            testdata("vmDeploymentTemplate.json"),
        )
        .env("ARMDEPLOY_SSH_KEY_PATH", testdata("id_rsa.pub"))
        .env("ARMDEPLOY_POLL_INTERVAL_SECS", "1")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

const GROUP_PATH: &str = "/subscriptions/sub/resourcegroups/your-azure-sample-group";
const DEPLOYMENT_PATH: &str = "/subscriptions/sub/resourcegroups/your-azure-sample-group/providers/Microsoft.Resources/deployments/azure-sample";

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_armdeploy"))
        .arg("--help")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let help = stdout(&output);
    assert!(help.contains("Deploy Azure Resource Manager templates"));
    for flag in ["--config", "--log-level", "--resource-group", "--location"] {
        assert!(help.contains(flag), "help is missing {flag}");
    }
    for command in ["deploy", "validate", "delete", "init"] {
        assert!(help.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_missing_credentials_are_all_named() -> Result<()> {
    let workdir = TempDir::new()?;
    let output = armdeploy(&workdir)
        .args(["deploy", "--teardown", "never"])
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    for var in CREDENTIAL_VARS {
        assert!(err.contains(var), "{var} not reported in: {err}");
    }
    assert!(!stdout(&output).contains("Get credentials and token"));
    Ok(())
}

#[test]
fn test_blank_credential_counts_as_missing() -> Result<()> {
    let workdir = TempDir::new()?;
    let output = armdeploy(&workdir)
        .env("AZURE_TENANT_ID", "tenant")
        .env("AZURE_CLIENT_ID", "client")
        .env("AZURE_CLIENT_SECRET", "")
        .env("AZURE_SUBSCRIPTION_ID", "sub")
        .output()?;

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("AZURE_CLIENT_SECRET"));
    assert!(!err.contains("AZURE_TENANT_ID"));
    Ok(())
}

#[test]
fn test_invalid_config_fails_before_network() -> Result<()> {
    let workdir = TempDir::new()?;
    let output = armdeploy(&workdir)
        .env("ARMDEPLOY_DNS_PREFIX", "Not_A_Label")
        .arg("validate")
        .output()?;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("dns_prefix"));
    Ok(())
}

#[test]
fn test_init_writes_config_non_interactively() -> Result<()> {
    let workdir = TempDir::new()?;
    let output = armdeploy(&workdir)
        .args([
            "--resource-group",
            "misty-glacier-2847",
            "--location",
            "eastus",
            "init",
            "--dns-prefix",
            "mistyvm",
            "--template-link",
            "--teardown",
            "always",
            "--force",
        ])
        .output()?;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let written = std::fs::read_to_string(workdir.path().join("armdeploy.toml"))?;
    assert!(written.contains("resource_group = \"misty-glacier-2847\""));
    assert!(written.contains("location = \"eastus\""));
    assert!(written.contains("source = \"link\""));
    assert!(written.contains("policy = \"always\""));
    Ok(())
}

#[test]
fn test_deploy_end_to_end_against_mock() -> Result<()> {
    let server = MockServer::start();

    let token = server.mock(|when, then| {
        when.method(POST)
            .path("/tenant/oauth2/token")
            .body_contains("grant_type=client_credentials")
            .body_contains("client_secret=secret");
        then.status(200).json_body(json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "access_token": "test-token"
        }));
    });
    let group = server.mock(|when, then| {
        when.method(PUT)
            .path(GROUP_PATH)
            .query_param("api-version", "2021-04-01")
            .header("authorization", "Bearer test-token")
            .json_body(json!({"location": "westus"}));
        then.status(201).json_body(json!({
            "name": "your-azure-sample-group",
            "location": "westus",
            "properties": {"provisioningState": "Succeeded"}
        }));
    });
    let validate = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/validate", DEPLOYMENT_PATH))
            .json_body_partial(
                r#"{"properties": {"mode": "Incremental", "parameters": {"vmName": {"value": "azure-deployment-sample-vm"}}}}"#,
            );
        then.status(200)
            .json_body(json!({"properties": {"provisioningState": "Succeeded"}}));
    });
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path(DEPLOYMENT_PATH)
            .json_body_partial(
                r#"{"properties": {"parameters": {"sshKeyData": {"value": "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDtestkeyonly azureSample@armdeploy-test\n"}}}}"#,
            );
        then.status(201)
            .header("Retry-After", "0")
            .json_body(json!({"properties": {"provisioningState": "Accepted"}}));
    });
    let get = server.mock(|when, then| {
        when.method(GET).path(DEPLOYMENT_PATH);
        then.status(200).json_body(json!({
            "properties": {"provisioningState": "Succeeded", "outputs": {}}
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(GROUP_PATH);
        then.status(200);
    });

    let workdir = TempDir::new()?;
    let output = with_mock_env(&mut armdeploy(&workdir), &server)
        .args(["deploy", "--teardown", "never"])
        .output()?;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    token.assert();
    group.assert();
    validate.assert();
    put.assert();
    assert!(get.hits() >= 1);
    assert_eq!(delete.hits(), 0);

    let out = stdout(&output);
    assert!(out.contains("Using local template"));
    assert!(out.contains("Deployment is validated! Template is syntactically correct"));
    assert!(out.contains("Finished deployment"));
    assert!(out.contains(
        "You can connect via ssh azureSample@sample-dns-prefix.westus.cloudapp.azure.com"
    ));
    Ok(())
}

#[test]
fn test_validation_failure_prints_block_and_tears_down() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/tenant/oauth2/token");
        then.status(200)
            .json_body(json!({"access_token": "test-token", "expires_in": 3599}));
    });
    server.mock(|when, then| {
        when.method(PUT).path(GROUP_PATH);
        then.status(200).json_body(json!({"name": "your-azure-sample-group"}));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{}/validate", DEPLOYMENT_PATH));
        then.status(400).json_body(json!({
            "error": {
                "code": "InvalidTemplate",
                "message": "Deployment template validation failed: 'The template parameter 'vmSize' is not found.'"
            }
        }));
    });
    let put = server.mock(|when, then| {
        when.method(PUT).path(DEPLOYMENT_PATH);
        then.status(201);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(GROUP_PATH);
        then.status(200);
    });

    let workdir = TempDir::new()?;
    let output = with_mock_env(&mut armdeploy(&workdir), &server)
        .env("ARMDEPLOY_TEARDOWN_ON_ERROR", "true")
        .args(["deploy", "--teardown", "never"])
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains(
        "Error! Code: InvalidTemplate\nMessage: Deployment template validation failed: 'The template parameter 'vmSize' is not found.'\nTarget: -"
    ));
    assert!(out.contains("Delete resource group..."));
    assert_eq!(put.hits(), 0);
    delete.assert();
    Ok(())
}

#[test]
fn test_delete_requires_yes_without_terminal() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/tenant/oauth2/token");
        then.status(200).json_body(json!({"access_token": "test-token"}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(GROUP_PATH);
        then.status(202)
            .header("Location", server.url("/operations/delete-1"))
            .header("Retry-After", "0");
    });
    let operation = server.mock(|when, then| {
        when.method(GET).path("/operations/delete-1");
        then.status(200);
    });

    let workdir = TempDir::new()?;

    // No terminal: the prompt cannot be answered, so nothing is deleted
    let output = with_mock_env(&mut armdeploy(&workdir), &server)
        .arg("delete")
        .output()?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Aborted."));
    assert_eq!(delete.hits(), 0);

    let output = with_mock_env(&mut armdeploy(&workdir), &server)
        .args(["delete", "--yes"])
        .output()?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    delete.assert();
    operation.assert();
    Ok(())
}

#[test]
fn test_prompt_teardown_without_terminal_keeps_group() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/tenant/oauth2/token");
        then.status(200)
            .json_body(json!({"access_token": "test-token", "expires_in": 3599}));
    });
    server.mock(|when, then| {
        when.method(PUT).path(GROUP_PATH);
        then.status(200).json_body(json!({"name": "your-azure-sample-group"}));
    });
    server.mock(|when, then| {
        when.method(PUT).path(DEPLOYMENT_PATH);
        then.status(200)
            .json_body(json!({"properties": {"provisioningState": "Succeeded"}}));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(GROUP_PATH);
        then.status(200);
    });

    let workdir = TempDir::new()?;
    let output = with_mock_env(&mut armdeploy(&workdir), &server)
        .args(["deploy", "--skip-validation", "--teardown", "prompt"])
        .output()?;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Finished deployment"));
    assert_eq!(delete.hits(), 0);
    Ok(())
}
