//! Buildboard CLI - Main entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use buildboard::commands::{self, OutputFormat};
use buildboard::Config;

#[derive(Parser)]
#[command(name = "buildboard")]
#[command(version, about = "Buildboard - CI and published artifact health for tracked repositories")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Path to configuration file
    #[arg(long, global = true, env = "BUILDBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh once and print the snapshot
    Snapshot,

    /// Keep printing snapshots as the cache refreshes
    Watch {
        /// Seconds between cache reads
        #[arg(short, long, default_value = "60")]
        interval: u64,

        /// Drop the cached snapshot before every read
        #[arg(long)]
        refresh: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
enum ConfigAction {
    /// Show current effective configuration
    Show,

    /// Initialize a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration; environment variables override the file
    let mut config = if let Some(path) = cli.config {
        let mut config = Config::from_file(&path)?;
        config.apply_env();
        config
    } else {
        Config::from_env()
    };

    config.debug = config.debug || cli.debug;

    // Setup logging
    let level = if config.debug { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::from_default_env().add_directive(format!("buildboard={level}").parse()?);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Snapshot => {
            config.validate()?;
            commands::snapshot(&config, cli.format).await?;
        }
        Commands::Watch { interval, refresh } => {
            config.validate()?;
            commands::watch(&config, interval, refresh, cli.format).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(&config, cli.format).await?;
            }
            ConfigAction::Init { output } => {
                commands::config_init(output).await?;
            }
        },
    }

    Ok(())
}
