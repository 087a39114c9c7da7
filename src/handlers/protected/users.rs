// handlers/protected/users.rs - user administration inside the caller's scope
//
// GET/POST /api/users, GET/PUT/DELETE /api/users/:id

use mongodb::bson::{doc, oid::ObjectId, Document};
use serde_json::Value;

use crate::access::{AccessScope, Resource, Role};
use crate::auth::hash_password_blocking;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::to_page;
use crate::middleware::{forget_user, ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::user::{public_user, CreateUserRequest, UpdateUserRequest};
use crate::models::validation::normalize_email;
use crate::models::FieldErrors;
use crate::services::FranchiseService;
use crate::types::Operation;

const SEARCH_FIELDS: &[&str] = &["name", "email", "phone"];

fn stored_role(document: &Document) -> Result<Role, ApiError> {
    document
        .get_str("role")
        .unwrap_or_default()
        .parse::<Role>()
        .map_err(ApiError::from)
}

/// Managing another user needs strictly higher rank, except for super admins
fn ensure_outranks(current: &CurrentUser, target: &Document) -> Result<(), ApiError> {
    if current.role() == Role::SuperAdmin {
        return Ok(());
    }
    let target_role = stored_role(target)?;
    if current.role().rank() <= target_role.rank() {
        return Err(ApiError::forbidden(format!(
            "Role '{}' cannot manage a user with role '{}'",
            current.role(),
            target_role
        )));
    }
    Ok(())
}

/// Role and tenancy codes the target holds once `set` is applied
fn tenancy_after(target: &Document, set: &Document) -> Result<(Role, Option<String>, Option<String>), ApiError> {
    let role = match set.get_str("role") {
        Ok(raw) => raw.parse::<Role>().map_err(ApiError::from)?,
        Err(_) => stored_role(target)?,
    };
    let code = |key: &str| {
        set.get_str(key)
            .or_else(|_| target.get_str(key))
            .ok()
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };
    Ok((role, code("franchise_code"), code("branch_code")))
}

/// A user must always resolve to a scope, so a branch role needs a branch
fn ensure_tenancy(role: Role, franchise_code: Option<&str>, branch_code: Option<&str>) -> Result<(), ApiError> {
    if branch_code.is_some() && franchise_code.is_none() {
        return Err(FieldErrors::single("branch_code", "A branch requires a franchise_code"));
    }
    AccessScope::derive(role, ObjectId::new(), franchise_code, branch_code)
        .map(|_| ())
        .map_err(|e| {
            let field = if franchise_code.is_none() { "franchise_code" } else { "branch_code" };
            FieldErrors::single(field, e.to_string())
        })
}

async fn ensure_branch_exists(franchise_code: &str, branch_code: &str) -> Result<(), ApiError> {
    let branches = Repository::open(collections::BRANCHES).await?;
    let found = branches
        .count(doc! { "franchise_code": franchise_code, "branch_code": branch_code })
        .await?;
    if found == 0 {
        return Err(FieldErrors::single(
            "branch_code",
            format!("Branch '{}' does not exist in franchise '{}'", branch_code, franchise_code),
        ));
    }
    Ok(())
}

/// GET /api/users - page through users visible to the caller
pub async fn users_list(current: CurrentUser, QueryParams(query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::User)?;

    let mut filter = Filter::from_query(&query, SEARCH_FIELDS)?;
    filter.default_order("name");
    let users = Repository::open(collections::USERS).await?;
    let (documents, total) = users
        .select_page(&filter, current.access.filter_for(Resource::User))
        .await?;
    let documents = documents.into_iter().map(public_user).collect();

    Ok(ApiResponse::success("Users", to_page(documents, &filter, total)))
}

/// POST /api/users - create a user of lower rank inside the caller's scope
pub async fn users_create(current: CurrentUser, JsonBody(payload): JsonBody<CreateUserRequest>) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::User)?;
    let role = payload.validate()?;
    if !current.access.can_assign_role(role) {
        return Err(ApiError::forbidden(format!(
            "Role '{}' cannot create users with role '{}'",
            current.role(),
            role
        )));
    }

    let password_hash = hash_password_blocking(payload.password.clone()).await?;
    let mut document = payload.into_document(role, password_hash);
    current.access.stamp(Resource::User, &mut document);

    // The new user's own scope must be derivable from the stamped codes
    let franchise_code = document.get_str("franchise_code").ok().map(str::to_string);
    let branch_code = document.get_str("branch_code").ok().map(str::to_string);
    ensure_tenancy(role, franchise_code.as_deref(), branch_code.as_deref())?;
    if let Some(code) = franchise_code.as_deref() {
        if FranchiseService::new().await?.find_by_code(code).await?.is_none() {
            return Err(ApiError::bad_request(format!("Franchise '{}' does not exist", code)));
        }
        if let Some(branch) = branch_code.as_deref() {
            ensure_branch_exists(code, branch).await?;
        }
    }

    let users = Repository::open(collections::USERS).await?;
    let email = normalize_email(document.get_str("email").unwrap_or_default());
    if users.count(doc! { "email": &email }).await? > 0 {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let stored = users.insert_one(document).await?;
    tracing::info!("{} created user {} as {}", current.user.email, email, role);
    Ok(ApiResponse::created("User created", document_to_json(public_user(stored))))
}

/// GET /api/users/:id
pub async fn user_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::User)?;
    let users = Repository::open(collections::USERS).await?;
    let user = users
        .select_404(parse_object_id(&id)?, current.access.filter_for(Resource::User))
        .await?;
    Ok(ApiResponse::success("User", document_to_json(public_user(user))))
}

/// PUT /api/users/:id - profile fields for everyone; role, branch and
/// activation only for managers acting on lower-ranked users
pub async fn user_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::User)?;
    let new_role = payload.validate()?;

    let id = parse_object_id(&id)?;
    let users = Repository::open(collections::USERS).await?;
    let target = users.select_404(id, current.access.filter_for(Resource::User)).await?;

    let privileged = new_role.is_some() || payload.branch_code.is_some() || payload.is_active.is_some();
    if privileged {
        if id == current.id() {
            return Err(ApiError::forbidden("You cannot change your own role, branch or status"));
        }
        if !current.role().is_staff_manager() {
            return Err(ApiError::forbidden("Only managers may change role, branch or status"));
        }
        ensure_outranks(&current, &target)?;
        if let Some(role) = new_role {
            if !current.access.can_assign_role(role) {
                return Err(ApiError::forbidden(format!("Role '{}' cannot assign role '{}'", current.role(), role)));
            }
        }
        if payload.branch_code.is_some() && matches!(current.access.scope(), AccessScope::Branch { .. }) {
            return Err(ApiError::forbidden("Branch staff cannot move users between branches"));
        }
    } else if id != current.id() {
        ensure_outranks(&current, &target)?;
    }

    let set = payload.to_set_document(new_role);
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let (role, franchise_code, branch_code) = tenancy_after(&target, &set)?;
    ensure_tenancy(role, franchise_code.as_deref(), branch_code.as_deref())?;
    if let (Some(franchise), Some(branch)) = (franchise_code.as_deref(), set.get_str("branch_code").ok()) {
        ensure_branch_exists(franchise, branch).await?;
    }
    let updated = users
        .update_404(id, current.access.filter_for(Resource::User), set)
        .await?;
    forget_user(&id).await;

    Ok(ApiResponse::success("User updated", document_to_json(public_user(updated))))
}

/// DELETE /api/users/:id - deactivate; accounts are never removed
pub async fn user_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Delete, Resource::User)?;
    let id = parse_object_id(&id)?;
    if id == current.id() {
        return Err(ApiError::forbidden("You cannot deactivate your own account"));
    }

    let users = Repository::open(collections::USERS).await?;
    let scope = current.access.filter_for(Resource::User);
    let target = users.select_404(id, scope.clone()).await?;
    ensure_outranks(&current, &target)?;

    let updated = users.update_404(id, scope, doc! { "is_active": false }).await?;
    forget_user(&id).await;
    tracing::info!("{} deactivated user {}", current.user.email, id);

    Ok(ApiResponse::success("User deactivated", document_to_json(public_user(updated))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Document {
        doc! { "role": "student", "franchise_code": "NORTH" }
    }

    #[test]
    fn promotion_without_a_branch_is_rejected() {
        let set = doc! { "role": "instructor" };
        let (role, franchise, branch) = tenancy_after(&student(), &set).unwrap();
        assert_eq!(role, Role::Instructor);
        assert_eq!(branch, None);

        let err = ensure_tenancy(role, franchise.as_deref(), branch.as_deref()).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_json()["field_errors"]["branch_code"].is_string());
    }

    #[test]
    fn promotion_with_a_branch_is_accepted() {
        let set = doc! { "role": "instructor", "branch_code": "B1" };
        let (role, franchise, branch) = tenancy_after(&student(), &set).unwrap();
        assert_eq!(franchise.as_deref(), Some("NORTH"));
        assert_eq!(branch.as_deref(), Some("B1"));
        assert!(ensure_tenancy(role, franchise.as_deref(), branch.as_deref()).is_ok());
    }

    #[test]
    fn profile_edits_keep_the_stored_tenancy() {
        let target = doc! { "role": "instructor", "franchise_code": "NORTH", "branch_code": "B1" };
        let (role, franchise, branch) = tenancy_after(&target, &doc! { "name": "Grace" }).unwrap();
        assert_eq!(role, Role::Instructor);
        assert!(ensure_tenancy(role, franchise.as_deref(), branch.as_deref()).is_ok());
    }

    #[test]
    fn branch_requires_a_franchise() {
        let target = doc! { "role": "student" };
        let (role, franchise, branch) = tenancy_after(&target, &doc! { "branch_code": "B1" }).unwrap();
        let err = ensure_tenancy(role, franchise.as_deref(), branch.as_deref()).unwrap_err();
        assert!(err.to_json()["field_errors"]["branch_code"].is_string());

        assert!(ensure_tenancy(Role::FranchiseAdmin, None, None).is_err());
        assert!(ensure_tenancy(Role::Admin, None, None).is_ok());
    }
}
