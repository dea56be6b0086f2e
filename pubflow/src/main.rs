mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "pubflow")]
#[command(about = "Release orchestration for multi-package repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a canary publish for a commit
    Canary {
        /// Repository as OWNER/NAME
        repo: String,
        /// Commit sha to publish from
        sha: String,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long, action)]
        yes: bool,
    },
    /// Show the publish order of the local workspace
    Order {
        /// Root of the repository checkout
        #[arg(long, default_value = ".")]
        repo_root: String,
        #[arg(long, action)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    match cli.command {
        Commands::Canary { repo, sha, yes } => commands::cmd_canary(&repo, &sha, yes).await?,
        Commands::Order { repo_root, json } => commands::cmd_order(&repo_root, json).await?,
    }

    Ok(())
}
