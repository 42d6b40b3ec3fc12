mod commands;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::EnvFilter;

use crate::config::SyncConfig;

#[derive(Parser)]
#[command(name = "taalsync")]
#[command(author, version, about = "Sync Dutch study projects with the cloud store", long_about = None)]
pub struct Cli {
    /// Override the remote API URL (default: TAALSYNC_API_URL or config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sync pass (upload, then download and merge)
    Sync,
    /// Show local and remote project counts
    Status,
    /// List local projects
    Projects,
}

fn load_config(api_url_override: Option<String>) -> Result<SyncConfig> {
    let mut config = SyncConfig::load()?;
    if let Some(url) = api_url_override {
        config.api_url = url;
    }
    Ok(config)
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taalsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Sync) => {
            let config = load_config(cli.api_url)?;
            let output = commands::sync::run_sync(&config).await?;
            println!("{output}");
        }
        Some(Commands::Status) => {
            let config = load_config(cli.api_url)?;
            let output = commands::sync::status(&config).await?;
            println!("{output}");
        }
        Some(Commands::Projects) => {
            let output = commands::project::list_projects().await?;
            println!("{output}");
        }
        None => {
            let _ = Cli::parse_from(["taalsync", "--help"]);
        }
    }
    Ok(())
}
