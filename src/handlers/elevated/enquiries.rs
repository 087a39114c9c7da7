// handlers/elevated/enquiries.rs - follow-up of public connect enquiries
//
// GET /api/admin/enquiries, PUT /api/admin/enquiries/:id/status

use mongodb::bson::doc;
use serde_json::Value;

use crate::access::Resource;
use crate::database::serialize::now;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::to_page;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::enquiry::{EnquiryStatus, EnquiryStatusRequest};
use crate::models::FieldErrors;
use crate::types::Operation;

/// GET /api/admin/enquiries - `status=new|contacted|closed`
pub async fn enquiries_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Enquiry)?;

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, &["name", "email", "message"])?;
    if let Some(status) = status {
        let status = EnquiryStatus::parse(&status)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown enquiry status '{}'", status)))?;
        filter.and_where(doc! { "status": status.as_str() });
    }
    filter.default_order("-created_at");

    let enquiries = Repository::open(collections::ENQUIRIES).await?;
    let (documents, total) = enquiries
        .select_page(&filter, current.access.filter_for(Resource::Enquiry))
        .await?;
    Ok(ApiResponse::success("Enquiries", to_page(documents, &filter, total)))
}

/// PUT /api/admin/enquiries/:id/status
pub async fn enquiry_status_put(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<EnquiryStatusRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Enquiry)?;
    if let Some(notes) = payload.notes.as_deref() {
        if notes.len() > 2_000 {
            return Err(FieldErrors::single("notes", "Must be at most 2000 characters"));
        }
    }

    let mut set = doc! {
        "status": payload.status.as_str(),
        "handled_by": current.id().to_hex(),
    };
    if let Some(notes) = payload.notes {
        set.insert("notes", notes);
    }
    if payload.status == EnquiryStatus::Contacted {
        set.insert("contacted_at", now());
    }

    let enquiries = Repository::open(collections::ENQUIRIES).await?;
    let updated = enquiries
        .update_404(parse_object_id(&id)?, current.access.filter_for(Resource::Enquiry), set)
        .await?;
    Ok(ApiResponse::success("Enquiry updated", document_to_json(updated)))
}
