// handlers/elevated/branches.rs - branches of a franchise
//
// GET/POST /api/admin/franchises/:code/branches, PUT/DELETE /api/admin/branches/:id

use mongodb::bson::doc;
use serde_json::{json, Value};

use crate::access::Resource;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam};
use crate::models::franchise::{normalize_code, CreateBranchRequest, UpdateBranchRequest};
use crate::services::FranchiseService;
use crate::types::Operation;

/// GET /api/admin/franchises/:code/branches
pub async fn branches_list(current: CurrentUser, PathParam(code): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::Branch)?;
    let franchise = FranchiseService::new().await?.visible(&current.access, &code).await?;
    let code = franchise.get_str("franchise_code").unwrap_or_default();

    let query = current.access.scoped(Resource::Branch, doc! { "franchise_code": code });
    let branches = Repository::open(collections::BRANCHES)
        .await?
        .select_any(query, Some(doc! { "branch_code": 1 }))
        .await?;
    Ok(ApiResponse::success("Branches", branches.into_iter().map(document_to_json).collect()))
}

/// POST /api/admin/franchises/:code/branches - codes are unique per franchise
pub async fn branches_create(
    current: CurrentUser,
    PathParam(code): PathParam<String>,
    JsonBody(payload): JsonBody<CreateBranchRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Branch)?;
    payload.validate()?;

    let franchise = FranchiseService::new().await?.visible(&current.access, &code).await?;
    let franchise_code = franchise.get_str("franchise_code").unwrap_or_default().to_string();
    let branch_code = normalize_code(&payload.branch_code);

    let branches = Repository::open(collections::BRANCHES).await?;
    let existing = branches
        .count(doc! { "franchise_code": &franchise_code, "branch_code": &branch_code })
        .await?;
    if existing > 0 {
        return Err(ApiError::conflict(format!(
            "Branch '{}' already exists in franchise {}",
            branch_code, franchise_code
        )));
    }

    let stored = branches.insert_one(payload.into_document(&franchise_code)).await?;
    tracing::info!("{} created branch {}/{}", current.user.email, franchise_code, branch_code);
    Ok(ApiResponse::created("Branch created", document_to_json(stored)))
}

/// PUT /api/admin/branches/:id
pub async fn branch_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateBranchRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Branch)?;
    payload.validate()?;

    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let branches = Repository::open(collections::BRANCHES).await?;
    let updated = branches
        .update_404(parse_object_id(&id)?, current.access.filter_for(Resource::Branch), set)
        .await?;
    Ok(ApiResponse::success("Branch updated", document_to_json(updated)))
}

/// DELETE /api/admin/branches/:id - refused while active users remain
pub async fn branch_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Delete, Resource::Branch)?;
    let id = parse_object_id(&id)?;
    let scope = current.access.filter_for(Resource::Branch);

    let branches = Repository::open(collections::BRANCHES).await?;
    let branch = branches.select_404(id, scope.clone()).await?;
    let franchise_code = branch.get_str("franchise_code").unwrap_or_default();
    let branch_code = branch.get_str("branch_code").unwrap_or_default();

    let assigned = Repository::open(collections::USERS)
        .await?
        .count(doc! {
            "franchise_code": franchise_code,
            "branch_code": branch_code,
            "is_active": true,
        })
        .await?;
    if assigned > 0 {
        return Err(ApiError::conflict(format!(
            "Branch still has {} active users; reassign or deactivate them first",
            assigned
        )));
    }

    branches.delete_404(id, scope).await?;
    tracing::info!("{} deleted branch {}/{}", current.user.email, franchise_code, branch_code);
    Ok(ApiResponse::success("Branch deleted", json!({ "id": id.to_hex() })))
}
