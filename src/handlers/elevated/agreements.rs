// handlers/elevated/agreements.rs - franchise agreements
//
// GET/POST /api/admin/franchises/:code/agreements, PUT /api/admin/agreements/:id

use mongodb::bson::doc;
use serde_json::Value;

use crate::access::Resource;
use crate::database::serialize::now;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam};
use crate::models::FieldErrors;
use crate::models::franchise::{AgreementStatus, CreateAgreementRequest, UpdateAgreementRequest};
use crate::services::FranchiseService;
use crate::types::Operation;

/// GET /api/admin/franchises/:code/agreements - newest first
pub async fn agreements_list(current: CurrentUser, PathParam(code): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::Agreement)?;
    let franchise = FranchiseService::new().await?.visible(&current.access, &code).await?;
    let code = franchise.get_str("franchise_code").unwrap_or_default();

    let query = current.access.scoped(Resource::Agreement, doc! { "franchise_code": code });
    let agreements = Repository::open(collections::AGREEMENTS)
        .await?
        .select_any(query, Some(doc! { "start_date": -1 }))
        .await?;
    Ok(ApiResponse::success("Agreements", agreements.into_iter().map(document_to_json).collect()))
}

/// POST /api/admin/franchises/:code/agreements
pub async fn agreements_create(
    current: CurrentUser,
    PathParam(code): PathParam<String>,
    JsonBody(payload): JsonBody<CreateAgreementRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Agreement)?;
    payload.validate()?;

    let franchise = FranchiseService::new().await?.visible(&current.access, &code).await?;
    let franchise_code = franchise.get_str("franchise_code").unwrap_or_default();

    let agreements = Repository::open(collections::AGREEMENTS).await?;
    let stored = agreements.insert_one(payload.into_document(franchise_code)).await?;
    tracing::info!("{} drafted an agreement for {}", current.user.email, franchise_code);
    Ok(ApiResponse::created("Agreement created", document_to_json(stored)))
}

/// PUT /api/admin/agreements/:id - activating an unsigned agreement signs it
pub async fn agreement_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateAgreementRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Agreement)?;
    payload.validate()?;

    let id = parse_object_id(&id)?;
    let scope = current.access.filter_for(Resource::Agreement);
    let agreements = Repository::open(collections::AGREEMENTS).await?;
    let agreement = agreements.select_404(id, scope.clone()).await?;

    let mut set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    if payload.status == Some(AgreementStatus::Active) && !agreement.contains_key("signed_at") {
        set.insert("signed_at", now());
    }
    if let Some(end) = payload.end_date {
        let starts_after = agreement
            .get_datetime("start_date")
            .map(|start| start.timestamp_millis() >= end.timestamp_millis())
            .unwrap_or(false);
        if starts_after {
            return Err(FieldErrors::single("end_date", "End date must be after the start date"));
        }
    }

    let updated = agreements.update_404(id, scope, set).await?;
    Ok(ApiResponse::success("Agreement updated", document_to_json(updated)))
}
