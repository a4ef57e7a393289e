//! sitesync CLI - Command-line interface for sitesync
//!
//! Provides commands for:
//! - Listing configured sites and checking their providers
//! - Inspecting provider settings schemas and batch limits
//! - Managing remote folders and files
//! - Uploading and downloading single files
//! - Moving project files between the active and the remote site

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    files::{LsCommand, MkdirCommand, RmCommand, TreeCommand},
    providers::{BatchLimitCommand, SchemaCommand},
    resolve::ResolveCommand,
    sites::SitesCommand,
    transfer::{DownloadCommand, PullCommand, PushCommand, UploadCommand},
    Session,
};
use output::{Output, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "sitesync", version, about = "Synchronize project files between storage sites")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List configured sites and whether their providers are active
    Sites(SitesCommand),
    /// Show the settings fields of a provider
    Schema(SchemaCommand),
    /// Show how many files a provider handles per sync loop
    BatchLimit(BatchLimitCommand),
    /// Show the folder index of a site
    Tree(TreeCommand),
    /// List a remote folder
    Ls(LsCommand),
    /// Create a remote folder
    Mkdir(MkdirCommand),
    /// Delete a remote file or folder
    Rm(RmCommand),
    /// Upload a local file to a site
    Upload(UploadCommand),
    /// Download a file from a site
    Download(DownloadCommand),
    /// Upload a project file to the remote site
    Push(PushCommand),
    /// Download a project file from the remote site
    Pull(PullCommand),
    /// Resolve root placeholders of a path
    Resolve(ResolveCommand),
}

impl Commands {
    async fn execute(&self, session: &Session, output: Output) -> Result<()> {
        match self {
            Commands::Sites(cmd) => cmd.execute(session, output).await,
            Commands::Schema(cmd) => cmd.execute(session, output).await,
            Commands::BatchLimit(cmd) => cmd.execute(session, output).await,
            Commands::Tree(cmd) => cmd.execute(session, output).await,
            Commands::Ls(cmd) => cmd.execute(session, output).await,
            Commands::Mkdir(cmd) => cmd.execute(session, output).await,
            Commands::Rm(cmd) => cmd.execute(session, output).await,
            Commands::Upload(cmd) => cmd.execute(session, output).await,
            Commands::Download(cmd) => cmd.execute(session, output).await,
            Commands::Push(cmd) => cmd.execute(session, output).await,
            Commands::Pull(cmd) => cmd.execute(session, output).await,
            Commands::Resolve(cmd) => cmd.execute(session, output).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session = Session::load(cli.config.as_deref())?;

    // Setup tracing; without -v the configured level applies
    let filter = match cli.verbose {
        0 => session.config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let output = Output::new(format);

    if let Err(err) = cli.command.execute(&session, output).await {
        output.error(&format!("{:#}", err));
        std::process::exit(1);
    }
    Ok(())
}
