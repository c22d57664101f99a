pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "ack")]
#[command(about = "Ack CLI - database setup and api key management for the admin API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create every collection the API uses")]
    Migrate,

    #[command(about = "Insert permissions, base roles, users, settings and the default api key")]
    Seed,

    #[command(about = "Hard-delete everything seed creates")]
    Remove,

    #[command(about = "Api key management")]
    ApiKey {
        #[command(subcommand)]
        cmd: commands::api_key::ApiKeyCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::database::migrate(output_format).await,
        Commands::Seed => commands::database::seed(output_format).await,
        Commands::Remove => commands::database::remove(output_format).await,
        Commands::ApiKey { cmd } => commands::api_key::handle(cmd, output_format).await,
    }
}
