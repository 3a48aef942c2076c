//! Toolweave CLI — the main entry point.
//!
//! Commands:
//! - `tools`   — List the built-in tools as the planner sees them
//! - `config`  — Show, locate or scaffold the configuration
//! - `replay`  — Run a query through the loop against a scripted model

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use toolweave_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolweave",
    about = "Toolweave — planning agent loop with mode-aware tool dispatch",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.toolweave/config.toml
    #[arg(short, long, global = true, env = "TOOLWEAVE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tools
    Tools {
        /// Print structured descriptions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Replay a scripted model transcript through the agent loop
    Replay {
        /// File of model responses separated by `---` lines
        #[arg(short, long)]
        script: PathBuf,

        /// The query to answer
        #[arg(default_value = "replay")]
        query: String,

        /// Print the full session as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the default config file location
    Path,
    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load().context("Failed to load config")?,
    };
    init_tracing(&config, cli.verbose);

    let source = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    if let Some(notice) = AppConfig::missing_file_notice(&source) {
        tracing::info!("{notice}");
    }

    match cli.command {
        Commands::Tools { json } => commands::tools::run(json)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config)?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init(),
        },
        Commands::Replay {
            script,
            query,
            json,
        } => commands::replay::run(&config, &script, &query, json).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
