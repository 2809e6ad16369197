//! sdswap CLI
//!
//! Diagnostics for a checkpoint store: list and resolve checkpoints, fingerprint
//! artifacts, inspect their weights and convert between formats.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use sdswap_common::{ConfigLoader, SwapConfig, SwapError, exit_codes};
use std::io;
use std::path::PathBuf;
use tracing::error;

mod commands;

use commands::{
    ConvertCommand, HashCommand, InspectCommand, ListCommand, MatchCommand, ResolveCommand,
};

/// Checkpoint registry and weight tooling for diffusion inference
#[derive(Parser)]
#[command(name = "sdswap")]
#[command(about = "Checkpoint registry and weight tooling for diffusion inference")]
#[command(long_about = r#"
Discovers checkpoints under the configured models directory, identifies them by a
short content fingerprint and resolves which one a load would pick.

Examples:
  # List every checkpoint in natural order
  sdswap list

  # Which checkpoint would a load use?
  sdswap resolve "sd-v1-4.ckpt [pickle] [7460a6fa]"

  # Inspect the weights inside an artifact
  sdswap inspect models/Stable-diffusion/sd-v1-4.ckpt

  # Re-encode a legacy checkpoint as safetensors
  sdswap convert sd-v1-4.ckpt sd-v1-4.safetensors
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML or JSON)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Models directory, overriding configuration
    #[arg(long, value_name = "DIR", global = true)]
    models_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered checkpoints
    #[command(alias = "ls")]
    List(ListCommand),

    /// Find the checkpoint whose title best matches a fragment
    Match(MatchCommand),

    /// Resolve the checkpoint a load would use
    Resolve(ResolveCommand),

    /// Print content fingerprints of files
    Hash(HashCommand),

    /// Inspect the weights inside a checkpoint
    Inspect(InspectCommand),

    /// Re-encode a checkpoint in another format
    #[command(alias = "conv")]
    Convert(ConvertCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate_completions(shell);
        return;
    }

    setup_logging(&cli.log_level, cli.log_format);

    if let Err(e) = run(cli) {
        error!("Command failed: {}", e);
        for cause in e.chain().skip(1) {
            error!("  Caused by: {}", cause);
        }
        eprintln!("{} {:#}", console::style("error:").red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    let config = load_configuration(cli.config, cli.models_dir)?;

    match command {
        Commands::List(cmd) => cmd.execute(&config),
        Commands::Match(cmd) => cmd.execute(&config),
        Commands::Resolve(cmd) => cmd.execute(&config),
        Commands::Hash(cmd) => cmd.execute(),
        Commands::Inspect(cmd) => cmd.execute(&config),
        Commands::Convert(cmd) => cmd.execute(&config),
        Commands::Config { action } => handle_config_command(action, &config),
    }
}

/// Defaults, then file, then environment, then command-line flags.
fn load_configuration(path: Option<PathBuf>, models_dir: Option<PathBuf>) -> Result<SwapConfig> {
    let mut config = ConfigLoader::load_with_precedence(path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = models_dir {
        config.storage.models_dir = dir;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn setup_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn handle_config_command(action: ConfigAction, config: &SwapConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let text =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            println!("{text}");
        }
        ConfigAction::Validate => {
            config.validate()?;
            println!("{} configuration is valid", console::style("✓").green());
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SwapError>())
        .map_or(exit_codes::EXIT_GENERIC_FAIL, SwapError::exit_code)
}
