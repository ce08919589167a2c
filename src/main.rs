//! Cognify CLI
//!
//! Commands:
//!   serve - Start the HTTP API server
//!   init  - Write a default config file
//!   info  - Show the effective configuration and storage usage

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cognify")]
#[command(about = "Study packs from PDFs and web pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write ~/.cognify/config.toml with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration (secrets masked) and storage usage
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => commands::run_serve(port).await?,
        Commands::Init { force } => commands::run_init(force)?,
        Commands::Info => commands::run_info()?,
    }

    Ok(())
}
