// handlers/protected/me.rs - the caller's own account
//
// GET /api/auth/me, PUT /api/auth/password

use mongodb::bson::doc;
use serde_json::{json, Value};

use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::database::{collections, Repository};
use crate::error::ApiError;
use crate::middleware::{forget_user, ApiResponse, ApiResult, CurrentUser, JsonBody};
use crate::models::user::ChangePasswordRequest;

/// GET /api/auth/me - stored profile plus the resolved access scope
pub async fn me_get(current: CurrentUser) -> ApiResult<Value> {
    let mut profile = current.user.to_json();
    profile["scope"] = serde_json::to_value(current.access.scope()).unwrap_or(Value::Null);
    Ok(ApiResponse::success("Current user", profile))
}

/// PUT /api/auth/password - change password after re-entering the current one
pub async fn password_put(
    current: CurrentUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Value> {
    payload.validate()?;

    if !verify_password_blocking(payload.current_password, current.user.password_hash.clone()).await {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash_password_blocking(payload.new_password).await?;
    let users = Repository::open(collections::USERS).await?;
    users
        .update_404(current.id(), doc! {}, doc! { "password_hash": password_hash })
        .await?;
    forget_user(&current.id()).await;
    tracing::info!("User {} changed their password", current.user.email);

    Ok(ApiResponse::success("Password updated", json!({ "id": current.id().to_hex() })))
}
