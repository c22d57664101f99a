use clap::Subcommand;
use serde_json::json;

use crate::cli::commands::open_store;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::services::ApiKeyService;

#[derive(Subcommand)]
pub enum ApiKeyCommands {
    #[command(about = "Create an api key and print its credentials once")]
    Create {
        #[arg(help = "Api key name")]
        name: String,

        #[arg(long, help = "Optional description")]
        description: Option<String>,
    },
}

pub async fn handle(cmd: ApiKeyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ApiKeyCommands::Create { name, description } => {
            let store = open_store().await?;
            let created = ApiKeyService::new(store).create(&name, description).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "apiKey": created }))?);
                }
                OutputFormat::Text => {
                    println!("✓ Created api key {}", name);
                    println!("{:<16} {}", "ID", created.id);
                    println!("{:<16} {}", "KEY", created.key);
                    println!("{:<16} {}", "SECRET", created.secret);
                    println!("{:<16} {}", "ENCRYPTION KEY", created.encryption_key);
                    println!("{:<16} {}", "PASSPHRASE", created.passphrase);
                    println!("The secret is not stored and cannot be shown again.");
                }
            }
            Ok(())
        }
    }
}
