use anyhow::{anyhow, bail};
use clap::Subcommand;
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::json;

use crate::access::AccessScope;
use crate::auth::hash_password_blocking;
use crate::cli::utils::output_fields;
use crate::cli::OutputFormat;
use crate::database::{collections, Repository};
use crate::models::user::CreateUserRequest;
use crate::models::validation::normalize_email;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create an administrator account directly in the database")]
    Create {
        #[arg(long, help = "Login email")]
        email: String,
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Initial password")]
        password: String,
        #[arg(long, default_value = "super_admin", help = "Role to assign")]
        role: String,
        #[arg(long, help = "Franchise code for franchise-scoped roles")]
        franchise_code: Option<String>,
        #[arg(long, help = "Branch code for branch-scoped roles")]
        branch_code: Option<String>,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create {
            email,
            name,
            password,
            role,
            franchise_code,
            branch_code,
        } => {
            let request = CreateUserRequest {
                name,
                email,
                password,
                role,
                phone: None,
                franchise_code,
                branch_code,
            };
            let role = request.validate()?;
            AccessScope::derive(
                role,
                ObjectId::new(),
                request.franchise_code.as_deref(),
                request.branch_code.as_deref(),
            )?;

            let users = Repository::open(collections::USERS).await?;
            let email = normalize_email(&request.email);
            if users.count(doc! { "email": &email }).await? > 0 {
                bail!("An account with email {} already exists", email);
            }

            let password_hash = hash_password_blocking(request.password.clone()).await?;
            let stored = users.insert_one(request.into_document(role, password_hash)).await?;
            let id = stored
                .get_object_id("_id")
                .map_err(|_| anyhow!("Inserted user has no id"))?;
            tracing::info!("Bootstrapped {} account {}", role, email);

            output_fields(
                &output_format,
                "Administrator created",
                &[
                    ("id", json!(id.to_hex())),
                    ("email", json!(email)),
                    ("role", json!(role.as_str())),
                ],
            )
        }
    }
}
