use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::manager::redact_uri;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Ping the configured MongoDB deployment")]
    Ping,

    #[command(about = "Create the unique and lookup indexes")]
    Indexes,
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let settings = &config::config().database;
    match cmd {
        DbCommands::Ping => {
            DatabaseManager::health_check().await?;
            output_fields(
                &output_format,
                "MongoDB reachable",
                &[
                    ("uri", json!(redact_uri(&settings.uri))),
                    ("database", json!(settings.name)),
                ],
            )
        }
        DbCommands::Indexes => {
            DatabaseManager::ensure_indexes().await?;
            output_fields(&output_format, "Indexes ensured", &[("database", json!(settings.name))])
        }
    }
}
