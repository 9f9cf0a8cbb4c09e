// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Forge: cluster template generation for the Kea ecosystem
//!
//! Command line entry point for the `forge` binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kea_forge::{
    apimodel::{MasterTopology, Overrides, ServicePrincipalProfile},
    config::LoggingConfig,
    generate::{self, GenerateOptions, GeneratePipeline, GenerateRequest},
    Config,
};

/// Kea-Forge: The Template Smith
///
/// Generates a deployment template, parameters file and PKI assets
/// from a declarative cluster definition.
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "forge.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a deployment template, parameters file and other assets for a cluster
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Load, merge and validate a cluster definition without writing anything
    Validate(ModelArgs),

    /// Show configuration
    Config,

    /// Initialize a new forge configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

/// Inputs shared by every command that reads an api model
#[derive(Args, Debug)]
struct ModelArgs {
    /// Path to the api model (alternative to --api-model)
    #[arg(value_name = "API_MODEL")]
    api_model_arg: Option<PathBuf>,

    /// Path to the api model
    #[arg(long)]
    api_model: Option<PathBuf>,

    /// Output directory (derived from the DNS prefix if absent)
    #[arg(long)]
    output_directory: Option<PathBuf>,

    /// Path to the CA certificate to use for PKI assets
    #[arg(long)]
    ca_certificate_path: Option<PathBuf>,

    /// Path to the CA private key to use for PKI assets
    #[arg(long)]
    ca_private_key_path: Option<PathBuf>,

    /// Override the cluster DNS prefix
    #[arg(long, requires = "ssh_public_key")]
    dns_prefix: Option<String>,

    /// Replace the SSH public keys with this key
    #[arg(long, requires = "dns_prefix")]
    ssh_public_key: Option<String>,

    /// Service principal client id; replaces the document's service principal
    #[arg(long, requires = "client_secret", requires = "dns_prefix")]
    client_id: Option<String>,

    /// Service principal secret
    #[arg(long, requires = "client_id")]
    client_secret: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Enable classic parameters and outputs
    #[arg(long)]
    classic_mode: bool,

    /// Skip pretty printing the output
    #[arg(long)]
    no_pretty_print: bool,

    /// Only output parameters files
    #[arg(long)]
    parameters_only: bool,
}

impl ModelArgs {
    /// The api model path, from the flag or the positional argument
    fn api_model_path(&self) -> anyhow::Result<PathBuf> {
        let flag = self
            .api_model
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());

        match (flag, &self.api_model_arg) {
            (Some(path), _) => Ok(path.clone()),
            (None, Some(path)) => Ok(path.clone()),
            (None, None) => anyhow::bail!(
                "--api-model was not supplied, nor was one specified as a positional argument"
            ),
        }
    }

    fn overrides(&self) -> Option<Overrides> {
        let dns_prefix = self.dns_prefix.clone()?;

        let service_principal = match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(secret)) => Some(ServicePrincipalProfile {
                client_id: client_id.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };

        Some(Overrides {
            service_principal,
            dns_prefix,
            ssh_public_key: self.ssh_public_key.clone().unwrap_or_default(),
        })
    }

    fn options(&self, config: &Config) -> anyhow::Result<GenerateOptions> {
        let mut options = GenerateOptions::new(self.api_model_path()?);
        options.output_directory = self.output_directory.clone();
        options.output_root = config.output.root.clone();
        options.ca_certificate_path = self.ca_certificate_path.clone();
        options.ca_private_key_path = self.ca_private_key_path.clone();
        options.classic_mode = config.generator.classic_mode;
        options.pretty_print = config.generator.pretty_print;
        options.parameters_only = config.generator.parameters_only;
        Ok(options)
    }

    fn request(&self, options: GenerateOptions) -> GenerateRequest {
        let request = GenerateRequest::new(options);
        match self.overrides() {
            Some(overrides) => request.with_overrides(overrides),
            None => request,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = Config::load_or_default(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&cli, &logging);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("Kea-Forge v{}", env!("CARGO_PKG_VERSION"));
            println!("The Template Smith for the Kea Ecosystem");
            Ok(())
        }

        Commands::Init { force } => init_config(&cli.config, force),

        Commands::Config => show_config(&cli.config),

        Commands::Validate(args) => validate_model(&cli.config, &args),

        Commands::Generate(args) => generate_assets(&cli.config, &args),
    }
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_config = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# Kea-Forge Configuration

name = "forge"
version = "1.0"

[output]
root = "_output"

[generator]
classic_mode = false
pretty_print = true
parameters_only = false

[i18n]
language = "en_US"
# translations_dir = "translations"

[logging]
level = "info"
format = "text"
"#;

    std::fs::write(config_path, default_config)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&Config::default())?);
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Validate an api model without generating anything
fn validate_model(config_path: &Path, args: &ModelArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let options = args.options(&config)?;
    let api_model_path = options.api_model_path.clone();

    let validated = generate::check(&args.request(options))
        .with_context(|| format!("error validating {}", api_model_path.display()))?;

    let model = validated.model();
    let topology = match model.properties.master {
        MasterTopology::Managed(_) => "managed",
        MasterTopology::Hosted(_) => "hosted",
    };

    println!("Api model '{}' is valid", api_model_path.display());
    println!();
    println!("  API version: {}", validated.api_version().as_str());
    println!("  Control plane: {}", topology);
    println!("  DNS prefix: {}", model.dns_prefix());
    println!("  Agent pools: {}", model.properties.agent_pool_profiles.len());
    println!(
        "  Output directory: {}",
        validated.output_directory().display()
    );

    Ok(())
}

/// Run the full generation pipeline
fn generate_assets(config_path: &Path, args: &GenerateArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let mut options = args.model.options(&config)?;
    options.classic_mode |= args.classic_mode;
    options.pretty_print &= !args.no_pretty_print;
    options.parameters_only |= args.parameters_only;

    let pipeline = GeneratePipeline::builtin(&config)?;
    let report = pipeline.run(&args.model.request(options))?;

    println!(
        "Generated assets into {}",
        report.output_directory.display()
    );
    if report.certs_generated {
        println!("  Generated a new cluster CA");
    }

    Ok(())
}
