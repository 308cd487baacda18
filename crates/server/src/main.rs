use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::database::connection::DbConnection;

pub(crate) mod auth;
pub(crate) mod config;
pub(crate) mod database;
pub(crate) mod error;
pub(crate) mod models;
pub(crate) mod server;
pub(crate) mod storage;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(name = "muro-server", about = "Personal media organizer service")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create database types and tables
    InitDb,
    /// Drop database tables and types
    DropDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_yaml_file(cli.config)?;

    match cli.command {
        Some(Command::InitDb) => {
            let db = DbConnection::connect(&config.database).await?;
            db.init_schema().await?;
        }
        Some(Command::DropDb) => {
            let db = DbConnection::connect(&config.database).await?;
            db.drop_schema().await?;
        }
        None => server::run_all(&config).await?,
    }

    Ok(())
}
