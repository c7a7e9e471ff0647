//! `armdeploy init`: interactive config file generator

use anyhow::{bail, Context, Result};
use armdeploy_config::{
    validate_dns_prefix, validate_resource_group_name, CloudEnvironment, TeardownPolicy,
    DEFAULT_CONTENT_VERSION, DEFAULT_TEMPLATE_URI,
};
use clap::Args;
use dialoguer::{Confirm, Input, Select};
use std::fs;
use std::path::{Path, PathBuf};

use super::names;

const TEMPLATE: &str = include_str!("../../templates/armdeploy.toml");

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the config file
    #[arg(long, value_name = "FILE", default_value = "armdeploy.toml")]
    pub output: PathBuf,

    /// DNS label prefix for the VM's public IP
    #[arg(long)]
    pub dns_prefix: Option<String>,

    /// Cloud environment: public, china, usgovernment
    #[arg(long)]
    pub environment: Option<CloudEnvironment>,

    /// Use the published sample template instead of a local file
    #[arg(long)]
    pub template_link: bool,

    /// Teardown after a successful run: prompt, always, never
    #[arg(long)]
    pub teardown: Option<TeardownPolicy>,

    /// Overwrite existing file without asking
    #[arg(long)]
    pub force: bool,
}

/// Values substituted into the config template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAnswers {
    pub environment: CloudEnvironment,
    pub resource_group: String,
    pub location: String,
    pub dns_prefix: String,
    pub template_link: bool,
    pub teardown: TeardownPolicy,
}

pub fn run(args: InitArgs, resource_group: Option<String>, location: Option<String>) -> Result<()> {
    println!();
    println!("armdeploy init - template deployment config");
    println!();

    let resource_group = match resource_group {
        Some(name) => {
            validate_resource_group_name(&name)
                .map_err(|e| anyhow::anyhow!("Invalid resource group name: {}", e))?;
            name
        }
        None => Input::new()
            .with_prompt("Resource group")
            .default(names::generate())
            .validate_with(|input: &String| validate_resource_group_name(input))
            .interact_text()?,
    };

    let location = match location {
        Some(location) => location,
        None => Input::new()
            .with_prompt("Location")
            .default("westus".to_string())
            .interact_text()?,
    };

    let dns_prefix = match args.dns_prefix {
        Some(prefix) => {
            validate_dns_prefix(&prefix).map_err(|e| anyhow::anyhow!("Invalid DNS prefix: {}", e))?;
            prefix
        }
        None => Input::new()
            .with_prompt("DNS label prefix")
            .default(default_dns_prefix(&resource_group))
            .validate_with(|input: &String| validate_dns_prefix(input))
            .interact_text()?,
    };

    let environment = args.environment.unwrap_or_default();

    let template_link = if args.template_link {
        true
    } else {
        let options = &[
            "Local - vmDeploymentTemplate.json",
            "Link  - published sample template",
        ];
        Select::new()
            .with_prompt("Template source")
            .items(options)
            .default(0)
            .interact()?
            == 1
    };

    let teardown = args.teardown.unwrap_or_default();

    if args.output.exists() && !args.force {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", args.output.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    let answers = InitAnswers {
        environment,
        resource_group,
        location,
        dns_prefix,
        template_link,
        teardown,
    };
    write_config(&args.output, &answers)?;

    println!();
    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Export AZURE_TENANT_ID, AZURE_CLIENT_ID, AZURE_CLIENT_SECRET, AZURE_SUBSCRIPTION_ID");
    println!("  2. Deploy:");
    println!("     armdeploy --config {} deploy", args.output.display());
    println!();

    Ok(())
}

/// Render and write the config file. Fails if the result does not parse.
pub fn write_config(path: &Path, answers: &InitAnswers) -> Result<()> {
    let content = render(answers);
    let parsed: armdeploy_config::DeployConfig =
        toml::from_str(&content).context("Generated config does not parse")?;
    if parsed.deployment.resource_group != answers.resource_group {
        bail!("Generated config lost the resource group name");
    }
    fs::write(path, &content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn render(answers: &InitAnswers) -> String {
    let template_section = if answers.template_link {
        format!(
            "[template]\nsource = \"link\"\nuri = \"{}\"\ncontent_version = \"{}\"",
            DEFAULT_TEMPLATE_URI, DEFAULT_CONTENT_VERSION
        )
    } else {
        "[template]\nsource = \"file\"\npath = \"vmDeploymentTemplate.json\"".to_string()
    };

    TEMPLATE
        .replace("{{ENVIRONMENT}}", &answers.environment.to_string())
        .replace("{{RESOURCE_GROUP}}", &answers.resource_group)
        .replace("{{LOCATION}}", &answers.location)
        .replace("{{DEPLOYMENT_NAME}}", "azure-sample")
        .replace("{{DNS_PREFIX}}", &answers.dns_prefix)
        .replace("{{VM_NAME}}", "azure-deployment-sample-vm")
        .replace("{{TEMPLATE_SECTION}}", &template_section)
        .replace("{{TEARDOWN}}", &answers.teardown.to_string())
}

/// Lowercased group name with anything outside `[a-z0-9-]` dropped.
fn default_dns_prefix(resource_group: &str) -> String {
    let candidate: String = resource_group
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    if validate_dns_prefix(&candidate).is_ok() {
        candidate
    } else {
        "sample-dns-prefix".to_string()
    }
}
