//! sillage - boat position tracking and media sharing server
//!
//! Subcommands:
//! - `sillage serve` - Run the HTTP API
//! - `sillage config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sillage::{serve, telemetry};
use sillageconf::SillageConfig;

#[derive(Parser)]
#[command(name = "sillage")]
#[command(about = "Position tracking and media sharing for a boat on the move")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Config file (replaces ./sillage.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// HTTP port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Directory for uploaded media
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },

    /// Show the effective configuration and where it came from
    Config {
        /// Config file (replaces ./sillage.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            upload_dir,
        } => {
            let (mut config, _sources) = SillageConfig::load_with_sources_from(config.as_deref())
                .context("Failed to load configuration")?;

            if let Some(port) = port {
                config.infra.bind.http_port = port;
            }
            if let Some(host) = host {
                config.infra.bind.host = host;
            }
            if let Some(dir) = upload_dir {
                config.infra.paths.upload_dir = dir;
            }

            telemetry::init(&config.infra.telemetry)?;
            serve::run(config).await?;
        }
        Commands::Config { config } => {
            let (config, sources) = SillageConfig::load_with_sources_from(config.as_deref())
                .context("Failed to load configuration")?;
            telemetry::init_console(&config.infra.telemetry.log_level);

            print!("{}", config.to_toml());
            println!();
            if sources.files.is_empty() {
                println!("# sources: defaults only");
            } else {
                for file in &sources.files {
                    println!("# file: {}", file.display());
                }
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
        }
    }

    Ok(())
}
