// handlers/mod.rs - 3-tier handler architecture
//
// Public (no auth) → Protected (JWT + active user) → Elevated (franchise management roles)
pub mod elevated; // Tier 3: /api/admin/*
pub mod protected; // Tier 2: /api/*
pub mod public; // Tier 1: /auth/*, /connect

use mongodb::bson::{oid::ObjectId, Document};
use serde_json::Value;

use crate::database::document_to_json;
use crate::error::ApiError;
use crate::filter::{Filter, Page};

/// Wrap one page of stored documents for the response envelope
pub(crate) fn to_page(documents: Vec<Document>, filter: &Filter, total: u64) -> Page<Value> {
    let items = documents.into_iter().map(document_to_json).collect();
    Page::new(items, filter.page(), filter.limit(), total)
}

/// Hex id of a stored document
pub(crate) fn id_hex(document: &Document) -> String {
    document
        .get_object_id("_id")
        .map(|id| id.to_hex())
        .unwrap_or_default()
}

pub(crate) fn object_id_of(document: &Document) -> Result<ObjectId, ApiError> {
    document
        .get_object_id("_id")
        .map_err(|_| ApiError::internal_server_error("Stored record has no id"))
}
