mod check_cmd;
mod console;
mod demo;
mod init_cmd;
mod repl_cmd;
mod terminal_output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::error;

use herald_config::{config_dir, config_file_path, load_and_prepare, LoggingConfig};
use herald_logging::init_logger;

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Herald: command handling for chat bots, driven from the console")]
#[command(version)]
struct Cli {
    /// Config file. Defaults to `herald.yaml` in the config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read messages from stdin and run them through the handler
    Repl {
        /// User id the console speaks as
        #[arg(short, long, default_value = "console-user")]
        user: String,
    },
    /// Validate the config file
    Check,
    /// Write a config file with every default filled in
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    match cli.command {
        Commands::Repl { user } => {
            let config = load_and_prepare(&path).await?;
            init_logging(config.logging.as_ref(), "warn")?;
            repl_cmd::run(config, &path, &user).await?;
        }
        Commands::Check => {
            init_logging(None, "warn")?;
            if !check_cmd::run(&path).await? {
                std::process::exit(1);
            }
        }
        Commands::Init { force } => {
            init_logging(None, "info")?;
            if let Err(e) = init_cmd::run(&path, force).await {
                error!(error = %e, "Init failed");
                return Err(e);
            }
        }
    }

    Ok(())
}

fn init_logging(logging: Option<&LoggingConfig>, fallback_level: &str) -> Result<()> {
    let level = logging
        .and_then(|l| l.level.as_deref())
        .unwrap_or(fallback_level);
    let dir = logging.and_then(|l| l.dir.as_deref()).map(Path::new);
    init_logger(dir, level)
}
