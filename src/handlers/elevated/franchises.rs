// handlers/elevated/franchises.rs - franchise registry
//
// GET/POST /api/admin/franchises, GET/PUT /api/admin/franchises/:code,
// POST /api/admin/franchises/:code/status

use mongodb::bson::doc;
use serde_json::Value;

use crate::access::Resource;
use crate::database::{collections, document_to_json, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::{object_id_of, to_page};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::franchise::{
    normalize_code, CreateFranchiseRequest, FranchiseStatus, FranchiseStatusRequest, UpdateFranchiseRequest,
};
use crate::services::FranchiseService;
use crate::types::Operation;

const SEARCH_FIELDS: &[&str] = &["name", "franchise_code", "owner_name", "email"];

fn require_global(current: &CurrentUser, action: &str) -> Result<(), ApiError> {
    if current.access.scope().is_global() {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("Only administrators may {} franchises", action)))
    }
}

/// GET /api/admin/franchises - `status=active|suspended|inactive`
pub async fn franchises_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Franchise)?;

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, SEARCH_FIELDS)?;
    if let Some(status) = status {
        let status = FranchiseStatus::parse(&status)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown franchise status '{}'", status)))?;
        filter.and_where(doc! { "status": status.as_str() });
    }
    filter.default_order("name");

    let service = FranchiseService::new().await?;
    let (documents, total) = service
        .franchises
        .select_page(&filter, current.access.filter_for(Resource::Franchise))
        .await?;
    Ok(ApiResponse::success("Franchises", to_page(documents, &filter, total)))
}

/// POST /api/admin/franchises
pub async fn franchises_create(
    current: CurrentUser,
    JsonBody(payload): JsonBody<CreateFranchiseRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Franchise)?;
    require_global(&current, "create")?;
    payload.validate()?;

    let service = FranchiseService::new().await?;
    let code = normalize_code(&payload.franchise_code);
    if service.find_by_code(&code).await?.is_some() {
        return Err(ApiError::conflict(format!("Franchise code '{}' is already taken", code)));
    }

    let stored = service.franchises.insert_one(payload.into_document()).await?;
    tracing::info!("{} created franchise {}", current.user.email, code);
    Ok(ApiResponse::created("Franchise created", document_to_json(stored)))
}

/// GET /api/admin/franchises/:code - franchise with branch and user counts
pub async fn franchise_get(current: CurrentUser, PathParam(code): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::Franchise)?;
    let franchise = FranchiseService::new().await?.visible(&current.access, &code).await?;
    let code = franchise.get_str("franchise_code").unwrap_or_default().to_string();

    let branches = Repository::open(collections::BRANCHES)
        .await?
        .count(doc! { "franchise_code": &code })
        .await?;
    let users = Repository::open(collections::USERS)
        .await?
        .count(doc! { "franchise_code": &code, "is_active": true })
        .await?;

    let mut body = document_to_json(franchise);
    body["branch_count"] = Value::from(branches);
    body["active_user_count"] = Value::from(users);
    Ok(ApiResponse::success("Franchise", body))
}

/// PUT /api/admin/franchises/:code - the code itself is immutable
pub async fn franchise_update(
    current: CurrentUser,
    PathParam(code): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateFranchiseRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Franchise)?;
    payload.validate()?;

    let service = FranchiseService::new().await?;
    let franchise = service.visible(&current.access, &code).await?;
    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }

    let updated = service
        .franchises
        .update_404(object_id_of(&franchise)?, current.access.filter_for(Resource::Franchise), set)
        .await?;
    Ok(ApiResponse::success("Franchise updated", document_to_json(updated)))
}

/// POST /api/admin/franchises/:code/status - suspending locks out every
/// user of the franchise on their next request
pub async fn franchise_status_post(
    current: CurrentUser,
    PathParam(code): PathParam<String>,
    JsonBody(payload): JsonBody<FranchiseStatusRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Franchise)?;
    require_global(&current, "change the status of")?;

    let updated = FranchiseService::new().await?.set_status(&code, payload.status).await?;
    tracing::warn!(
        "{} set franchise {} to {}",
        current.user.email,
        normalize_code(&code),
        payload.status.as_str()
    );
    Ok(ApiResponse::success("Franchise status updated", document_to_json(updated)))
}
