use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use mongodb::bson::{doc, oid::ObjectId};
use once_cell::sync::Lazy;

use super::auth::AuthUser;
use crate::access::{BranchAccessManager, Role};
use crate::cache::TtlCache;
use crate::config;
use crate::database::{collections, Repository};
use crate::error::ApiError;
use crate::models::User;
use crate::services::franchise_service::FranchiseService;

static USER_CACHE: Lazy<TtlCache<ObjectId, User>> = Lazy::new(|| {
    TtlCache::new(Duration::from_secs(config::config().cache.user_ttl_secs), 10_000)
});

/// Resolved caller: the stored user plus their access manager
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub access: BranchAccessManager,
}

impl CurrentUser {
    pub fn id(&self) -> ObjectId {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.access.role()
    }

    pub fn require_roles(&self, allowed: &[Role]) -> Result<(), ApiError> {
        require_roles(self.role(), allowed)
    }
}

pub fn require_roles(role: Role, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        tracing::debug!("Role {} not in {:?}", role, allowed);
        Err(ApiError::forbidden(format!(
            "Role '{}' is not permitted to perform this action",
            role
        )))
    }
}

/// Drop a cached user after their record changes
pub async fn forget_user(id: &ObjectId) {
    USER_CACHE.invalidate(id).await;
}

async fn load_user(id: ObjectId) -> Result<Option<User>, ApiError> {
    if let Some(user) = USER_CACHE.get(&id).await {
        return Ok(Some(user));
    }

    let users = Repository::open(collections::USERS).await?;
    match users.select_one(doc! { "_id": id }).await? {
        Some(document) => {
            let user = User::from_document(document)?;
            USER_CACHE.insert(id, user.clone()).await;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Turn a verified token into the caller's stored identity and scope.
///
/// The role and tenancy come from the stored user rather than the token, so
/// demotions, moves and deactivations apply without waiting for expiry.
pub async fn get_current_user(auth: &AuthUser) -> Result<CurrentUser, ApiError> {
    let id = ObjectId::parse_str(&auth.user_id)
        .map_err(|_| ApiError::unauthorized("Token subject is not a valid user id"))?;

    let user = load_user(id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !user.is_active {
        tracing::warn!("Inactive user {} attempted access", user.email);
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let role = user.role()?;
    if !role.is_global() {
        if let Some(code) = user.franchise_code.as_deref() {
            FranchiseService::new().await?.ensure_active(code).await?;
        }
    }

    let access = BranchAccessManager::for_user(
        role,
        user.id,
        user.franchise_code.as_deref(),
        user.branch_code.as_deref(),
    )?;
    tracing::debug!("Resolved {} as {} with scope {:?}", user.email, role, access.scope());

    Ok(CurrentUser { user, access })
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }
        let auth = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let current = get_current_user(&auth).await?;
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

/// Roles admitted to `/api/admin/*`
pub const ELEVATED_ROLES: &[Role] = &[
    Role::SuperAdmin,
    Role::Admin,
    Role::FranchiseAdmin,
    Role::BranchAdmin,
];

/// Elevated tier guard; runs after [`super::auth::jwt_auth_middleware`]
pub async fn elevated_role_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let current = get_current_user(&auth).await?;
    current.require_roles(ELEVATED_ROLES)?;
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_gate() {
        assert!(require_roles(Role::Admin, ELEVATED_ROLES).is_ok());
        let err = require_roles(Role::Student, ELEVATED_ROLES).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(require_roles(Role::Instructor, &[Role::Instructor, Role::BranchAdmin]).is_ok());
    }

    #[tokio::test]
    async fn malformed_subject_is_unauthorized() {
        let auth = AuthUser {
            user_id: "not-an-object-id".into(),
            email: "x@y.z".into(),
            role: "student".into(),
            franchise_code: None,
            branch_code: None,
            expires_at: 0,
        };
        let err = get_current_user(&auth).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
