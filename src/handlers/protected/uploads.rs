// handlers/protected/uploads.rs - multipart file uploads
//
// POST /api/uploads/:category, GET /api/uploads
// Stored files are served statically under /uploads

use mongodb::bson::{doc, Document};
use serde::Deserialize;
use serde_json::Value;

use crate::access::Resource;
use crate::database::{collections, document_to_json, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::to_page;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, MultipartForm, PathParam, QueryParams};
use crate::services::upload_service::UploadCategory;
use crate::services::{UploadError, UploadService};
use crate::types::Operation;

#[derive(Debug, Deserialize)]
pub struct UploadListQuery {
    pub category: Option<String>,
}

/**
 * POST /api/uploads/:category - store the multipart field named `file`
 *
 * The body is read chunk by chunk and rejected with 413 as soon as it
 * passes the configured limit.
 */
pub async fn upload_post(
    current: CurrentUser,
    PathParam(category): PathParam<String>,
    MultipartForm(mut multipart): MultipartForm,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Upload)?;
    let category = UploadCategory::parse(&category)?;
    let service = UploadService::from_config();

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            bytes.extend_from_slice(&chunk);
            service.check_size(bytes.len() as u64)?;
        }

        let stored = service.store(category, &original_name, content_type, &bytes).await?;
        let mut document = doc! {
            "category": stored.category.as_str(),
            "original_name": &stored.original_name,
            "stored_name": &stored.stored_name,
            "path": &stored.path,
            "url": &stored.url,
            "size": stored.size as i64,
            "sha256": &stored.sha256,
            "uploaded_by": current.id().to_hex(),
        };
        if let Some(content_type) = &stored.content_type {
            document.insert("content_type", content_type);
        }
        current.access.stamp(Resource::Upload, &mut document);

        let record = match record_upload(document).await {
            Ok(record) => record,
            Err(e) => {
                service.discard(&stored).await;
                return Err(e);
            }
        };
        return Ok(ApiResponse::created("File uploaded", document_to_json(record)));
    }

    Err(UploadError::MissingFile.into())
}

async fn record_upload(document: Document) -> Result<Document, ApiError> {
    let uploads = Repository::open(collections::UPLOADS).await?;
    Ok(uploads.insert_one(document).await?)
}

/// GET /api/uploads - `category=` narrows to one category
pub async fn uploads_list(
    current: CurrentUser,
    QueryParams(query): QueryParams<ListQuery>,
    QueryParams(upload_query): QueryParams<UploadListQuery>,
) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Upload)?;

    let mut filter = Filter::from_query(&query, &["original_name"])?;
    if let Some(category) = upload_query.category {
        let category = UploadCategory::parse(&category)?;
        filter.and_where(doc! { "category": category.as_str() });
    }
    filter.default_order("-created_at");

    let uploads = Repository::open(collections::UPLOADS).await?;
    let (documents, total) = uploads
        .select_page(&filter, current.access.filter_for(Resource::Upload))
        .await?;
    Ok(ApiResponse::success("Uploads", to_page(documents, &filter, total)))
}
