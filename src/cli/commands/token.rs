use anyhow::{anyhow, Context};
use clap::Subcommand;
use mongodb::bson::doc;
use serde_json::json;

use crate::auth::{decode_jwt, generate_jwt, Claims};
use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;
use crate::database::{collections, Repository};
use crate::models::validation::normalize_email;
use crate::models::User;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign an access token for a stored user")]
    Issue {
        #[arg(help = "Email of the user")]
        email: String,
        #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Verify a token and print its claims")]
    Decode {
        #[arg(help = "Bearer token")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { email, hours } => {
            let email = normalize_email(&email);
            let users = Repository::open(collections::USERS).await?;
            let document = users
                .select_one(doc! { "email": &email })
                .await?
                .ok_or_else(|| anyhow!("No user with email {}", email))?;
            let user = User::from_document(document)?;
            if !user.is_active {
                return Err(anyhow!("User {} is deactivated", email));
            }

            let mut claims = user.claims();
            if let Some(hours) = hours {
                claims = Claims::with_expiry(
                    claims.sub,
                    claims.email,
                    claims.role,
                    claims.franchise_code,
                    claims.branch_code,
                    hours,
                );
            }
            let token = generate_jwt(&claims).context("failed to sign token")?;
            output_fields(
                &output_format,
                "Token issued",
                &[
                    ("token", json!(token)),
                    ("role", json!(claims.role)),
                    ("expires_in", json!(claims.expires_in())),
                ],
            )
        }
        TokenCommands::Decode { token } => {
            let claims = decode_jwt(&token)?;
            output_fields(
                &output_format,
                "Token is valid",
                &[
                    ("sub", json!(claims.sub)),
                    ("email", json!(claims.email)),
                    ("role", json!(claims.role)),
                    ("franchise_code", json!(claims.franchise_code)),
                    ("branch_code", json!(claims.branch_code)),
                    ("expires_in", json!(claims.expires_in())),
                ],
            )
        }
    }
}
