pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "lms")]
#[command(about = "LMS CLI - Operator tasks for the LMS API (bootstrap, tokens, database)")]
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
    #[command(about = "Administrator account bootstrap")]
    Admin {
        #[command(subcommand)]
        cmd: commands::admin::AdminCommands,
    },

    #[command(about = "Password hashing utilities")]
    Password {
        #[command(subcommand)]
        cmd: commands::password::PasswordCommands,
    },

    #[command(about = "Access token management")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "MongoDB connectivity and indexes")]
    Db {
        #[command(subcommand)]
        cmd: commands::db::DbCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
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
        Commands::Admin { cmd } => commands::admin::handle(cmd, output_format).await,
        Commands::Password { cmd } => commands::password::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Db { cmd } => commands::db::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_selects_json_output() {
        let cli = Cli::parse_from(["lms", "--json", "db", "ping"]);
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));

        let cli = Cli::parse_from(["lms", "password", "hash", "Secret123"]);
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
    }

    #[test]
    fn admin_create_parses_role_default() {
        let cli = Cli::parse_from([
            "lms", "admin", "create", "--email", "root@example.org", "--name", "Root", "--password", "Secret123",
        ]);
        match cli.command {
            Commands::Admin { cmd: commands::admin::AdminCommands::Create { role, .. } } => {
                assert_eq!(role, "super_admin");
            }
            _ => panic!("expected admin create"),
        }
    }
}
