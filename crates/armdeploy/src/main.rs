use anyhow::{Context, Result};
use armdeploy::commands::{init_config, InitArgs};
use armdeploy::{parameters, report, Orchestrator};
use armdeploy_arm::{DeployError, ReqwestHttpClient};
use armdeploy_config::{
    load_credentials, Credentials, DeployConfig, ParametersConfig, StdEnvSource, TeardownPolicy,
    TemplateConfig,
};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

/// Deploy Azure Resource Manager templates
#[derive(Parser)]
#[command(name = "armdeploy")]
#[command(version)]
#[command(about = "Deploy Azure Resource Manager templates into a resource group", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Target resource group (overrides config file)
    #[arg(short = 'g', long, value_name = "NAME", global = true)]
    resource_group: Option<String>,

    /// Azure region for the resource group (overrides config file)
    #[arg(short, long, value_name = "LOCATION", global = true)]
    location: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the group, validate and deploy the template (default)
    Deploy(DeployArgs),
    /// Validate the template against the resource group without deploying
    Validate,
    /// Delete the resource group and everything in it
    Delete {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Write an armdeploy.toml interactively
    Init(InitArgs),
}

#[derive(Args, Default)]
struct DeployArgs {
    /// Deploy without the dry-run validation
    #[arg(long)]
    skip_validation: bool,

    /// Delete the group after a successful deployment: prompt, always, never
    #[arg(long, value_name = "POLICY")]
    teardown: Option<TeardownPolicy>,

    /// Public key inserted as sshKeyData (default: ~/.ssh/id_rsa.pub)
    #[arg(long, value_name = "PATH")]
    ssh_key: Option<PathBuf>,

    /// Use the remote template link instead of a local file
    #[arg(long)]
    template_link: bool,

    /// Use the remote parameters link instead of local parameters
    #[arg(long)]
    parameters_link: bool,
}

/// Remote work a command needs after setup
enum Action {
    Deploy,
    Validate,
    Delete { yes: bool },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// The one place errors are rendered.
fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<DeployError>() {
        Some(DeployError::ValidationFailed { detail, .. }) => {
            println!("{}", report::format_validation_error(detail));
        }
        Some(deploy_err) => eprintln!("Error: {}", deploy_err),
        None => eprintln!("Error: {:#}", err),
    }
}

fn run(mut cli: Cli) -> Result<()> {
    let command = cli
        .command
        .take()
        .unwrap_or_else(|| Commands::Deploy(DeployArgs::default()));

    let (action, deploy_args) = match command {
        Commands::Init(args) => {
            return init_config::run(args, cli.resource_group.take(), cli.location.take())
        }
        Commands::Deploy(args) => (Action::Deploy, Some(args)),
        Commands::Validate => (Action::Validate, None),
        Commands::Delete { yes } => (Action::Delete { yes }, None),
    };

    let env = StdEnvSource;

    // Step 1: Load configuration (file + ARMDEPLOY_* overrides)
    let mut config = match &cli.config {
        Some(path) => DeployConfig::load_from_path_with_env(path, &env)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DeployConfig::load_with_env(&env).context("Failed to load configuration")?,
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli, deploy_args.as_ref())?;
    config.validate()?;

    // Step 3: Logging
    armdeploy::init_tracing(&config.logging);

    // Step 4: Credentials, before any network call
    let credentials = load_credentials(&env).map_err(DeployError::from)?;
    let default_key = parameters::default_ssh_key_path(&env);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(execute(action, config, credentials, default_key))
}

fn apply_cli_overrides(
    config: &mut DeployConfig,
    cli: &Cli,
    deploy: Option<&DeployArgs>,
) -> Result<()> {
    if let Some(group) = &cli.resource_group {
        config.deployment.resource_group = group.clone();
    }
    if let Some(location) = &cli.location {
        config.deployment.location = location.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    let Some(args) = deploy else {
        return Ok(());
    };

    if args.skip_validation {
        config.deployment.validate = false;
    }
    if let Some(policy) = args.teardown {
        config.teardown.policy = policy;
    }
    if args.template_link && !matches!(config.template, TemplateConfig::Link { .. }) {
        config.template = TemplateConfig::default_link();
    }
    if args.parameters_link && !matches!(config.parameters, ParametersConfig::Link { .. }) {
        config.parameters = ParametersConfig::default_link();
    }
    if let Some(key) = &args.ssh_key {
        match &mut config.parameters {
            ParametersConfig::Inline { ssh_key_path, .. } => {
                *ssh_key_path = Some(key.to_string_lossy().to_string());
            }
            ParametersConfig::Link { .. } => {
                anyhow::bail!("--ssh-key cannot be combined with linked parameters");
            }
        }
    }

    Ok(())
}

async fn execute(
    action: Action,
    config: DeployConfig,
    credentials: Credentials,
    default_key: Option<PathBuf>,
) -> Result<()> {
    info!(
        group = %config.deployment.resource_group,
        location = %config.deployment.location,
        environment = %config.azure.environment,
        "Starting armdeploy v{}",
        env!("CARGO_PKG_VERSION")
    );

    let http = ReqwestHttpClient::new(config.azure.request_timeout())?;
    let mut orchestrator = Orchestrator::connect(http, &credentials, config)
        .await?
        .with_default_key_path(default_key);

    match action {
        Action::Deploy => {
            let report = orchestrator.run(confirm_teardown).await?;
            info!(stage = %report.stage, "Run complete");
        }
        Action::Validate => {
            let report = orchestrator.validate_only().await?;
            info!(stage = %report.stage, "Validation complete");
        }
        Action::Delete { yes } => {
            let group = orchestrator.config().deployment.resource_group.clone();
            if !yes && !confirm_teardown(&group) {
                println!("Aborted.");
                return Ok(());
            }
            orchestrator.teardown().await?;
        }
    }

    Ok(())
}

/// Ask on the terminal; without one, keep the group.
fn confirm_teardown(group: &str) -> bool {
    let answer = Confirm::new()
        .with_prompt(format!(
            "Delete resource group '{}' and everything in it?",
            group
        ))
        .default(false)
        .interact();

    match answer {
        Ok(yes) => yes,
        Err(e) => {
            warn!(error = %e, "No terminal to confirm teardown; keeping resource group");
            false
        }
    }
}
