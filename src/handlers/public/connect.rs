// handlers/public/connect.rs - POST /connect
//
// Contact/enquiry form for prospective students and franchisees.

use serde_json::Value;

use crate::database::{collections, document_to_json, Repository};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::models::enquiry::ConnectRequest;

pub async fn connect_post(JsonBody(payload): JsonBody<ConnectRequest>) -> ApiResult<Value> {
    payload.validate()?;

    let enquiries = Repository::open(collections::ENQUIRIES).await?;
    let stored = enquiries.insert_one(payload.into_document()).await?;
    tracing::info!(
        "New {} enquiry from {}",
        stored.get_str("enquiry_type").unwrap_or("general"),
        stored.get_str("email").unwrap_or_default()
    );

    Ok(ApiResponse::created(
        "Thank you, we will be in touch shortly",
        document_to_json(stored),
    ))
}
