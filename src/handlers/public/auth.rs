// handlers/public/auth.rs - token acquisition endpoints
//
// POST /auth/register, POST /auth/login, POST /auth/refresh

use mongodb::bson::doc;
use serde_json::{json, Value};

use crate::auth::{decode_jwt, generate_jwt, hash_password_blocking, verify_password_blocking};
use crate::config;
use crate::database::{collections, serialize::now, Repository};
use crate::error::ApiError;
use crate::middleware::{forget_user, get_current_user, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::models::franchise::normalize_code;
use crate::models::user::{LoginRequest, RefreshRequest, RegisterRequest};
use crate::models::validation::normalize_email;
use crate::models::{FieldErrors, User};
use crate::services::FranchiseService;

fn token_payload(user: &User) -> Result<Value, ApiError> {
    let claims = user.claims();
    let token = generate_jwt(&claims)?;
    Ok(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_in": claims.expires_in(),
        "user": user.to_json(),
    }))
}

/**
 * POST /auth/register - Student self-registration
 *
 * Input: `{ name, email, password, phone?, franchise_code?, branch_code? }`.
 * A supplied franchise must exist and be active; a supplied branch must
 * belong to it. Returns a token exactly like login.
 */
pub async fn register_post(JsonBody(payload): JsonBody<RegisterRequest>) -> ApiResult<Value> {
    if !config::config().security.allow_self_registration {
        return Err(ApiError::forbidden("Self-registration is disabled"));
    }
    payload.validate()?;

    if let Some(code) = payload.franchise_code.as_deref() {
        let franchises = FranchiseService::new().await?;
        match franchises.ensure_active(code).await {
            Ok(()) => {}
            Err(e) if e.status_code() == 403 => {
                return Err(ApiError::bad_request(format!(
                    "Franchise '{}' is not accepting registrations",
                    normalize_code(code)
                )));
            }
            Err(e) => return Err(e),
        }
        if let Some(branch) = payload.branch_code.as_deref() {
            let branches = Repository::open(collections::BRANCHES).await?;
            let found = branches
                .count(doc! {
                    "franchise_code": normalize_code(code),
                    "branch_code": normalize_code(branch),
                })
                .await?;
            if found == 0 {
                return Err(ApiError::bad_request(format!(
                    "Branch '{}' does not exist in franchise '{}'",
                    normalize_code(branch),
                    normalize_code(code)
                )));
            }
        }
    }

    let users = Repository::open(collections::USERS).await?;
    let email = normalize_email(&payload.email);
    if users.count(doc! { "email": &email }).await? > 0 {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password_blocking(payload.password.clone()).await?;
    let stored = users.insert_one(payload.into_document(password_hash)).await?;
    let user = User::from_document(stored)?;
    tracing::info!("Registered student {} ({})", user.email, user.id);

    Ok(ApiResponse::created("Registration successful", token_payload(&user)?))
}

/**
 * POST /auth/login - Authenticate with email and password
 *
 * Unknown emails and wrong passwords are indistinguishable (401).
 * Deactivated accounts and users of suspended franchises get 403.
 */
pub async fn login_post(JsonBody(payload): JsonBody<LoginRequest>) -> ApiResult<Value> {
    payload.validate()?;

    let users = Repository::open(collections::USERS).await?;
    let email = normalize_email(&payload.email);
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let document = users.select_one(doc! { "email": &email }).await?.ok_or_else(|| {
        tracing::warn!("Login attempt for unknown email {}", email);
        invalid()
    })?;
    let user = User::from_document(document)?;

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await {
        tracing::warn!("Failed login for {}", email);
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }
    let role = user.role()?;
    if !role.is_global() {
        if let Some(code) = user.franchise_code.as_deref() {
            FranchiseService::new().await?.ensure_active(code).await?;
        }
    }

    users
        .update_404(user.id, doc! {}, doc! { "last_login_at": now() })
        .await?;
    forget_user(&user.id).await;
    tracing::info!("User {} logged in as {}", user.email, role);

    Ok(ApiResponse::success("Login successful", token_payload(&user)?))
}

/**
 * POST /auth/refresh - Exchange a still-valid token for a fresh one
 *
 * The new token reflects the stored user, so role or tenancy changes made
 * since the old token was issued are picked up here.
 */
pub async fn refresh_post(JsonBody(payload): JsonBody<RefreshRequest>) -> ApiResult<Value> {
    if payload.token.trim().is_empty() {
        return Err(FieldErrors::single("token", "This field is required"));
    }
    let claims = decode_jwt(payload.token.trim())?;
    let current = get_current_user(&AuthUser::from(claims)).await?;

    Ok(ApiResponse::success("Token refreshed", token_payload(&current.user)?))
}
