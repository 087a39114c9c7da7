use anyhow::anyhow;
use clap::Subcommand;
use serde_json::json;

use crate::auth::{hash_password_blocking, validate_password_strength, verify_password_blocking};
use crate::cli::utils::{output_error, output_fields};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum PasswordCommands {
    #[command(about = "Hash a password with the configured bcrypt cost")]
    Hash {
        #[arg(help = "Plain-text password")]
        password: String,
    },

    #[command(about = "Check a password against a bcrypt hash")]
    Verify {
        #[arg(help = "Plain-text password")]
        password: String,
        #[arg(help = "bcrypt hash")]
        hash: String,
    },
}

pub async fn handle(cmd: PasswordCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PasswordCommands::Hash { password } => {
            validate_password_strength(&password).map_err(|msg| anyhow!(msg))?;
            let hash = hash_password_blocking(password).await?;
            output_fields(&output_format, "Password hashed", &[("hash", json!(hash))])
        }
        PasswordCommands::Verify { password, hash } => {
            if verify_password_blocking(password, hash).await {
                output_fields(&output_format, "Password matches", &[("valid", json!(true))])
            } else {
                output_error(&output_format, "Password does not match", Some("MISMATCH"))?;
                std::process::exit(2);
            }
        }
    }
}
