// handlers/protected/courses.rs - course catalogue
//
// GET/POST /api/courses, GET/PUT/DELETE /api/courses/:id, POST /api/courses/:id/publish

use mongodb::bson::doc;
use serde_json::Value;

use crate::access::{Resource, Role};
use crate::database::{collections, document_to_json, parse_object_id, serialize::now, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::to_page;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::course::{CreateCourseRequest, PublishRequest, UpdateCourseRequest};
use crate::services::course_service::{ensure_deletable, ensure_instructor_owns};
use crate::services::{CourseService, FranchiseService};
use crate::types::Operation;

const SEARCH_FIELDS: &[&str] = &["title", "description", "category"];

/// GET /api/courses - `status=published|draft` filters on publication
pub async fn courses_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Course)?;

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, SEARCH_FIELDS)?;
    match status.as_deref() {
        Some("published") => {
            filter.and_where(doc! { "is_published": true });
        }
        Some("draft") => {
            filter.and_where(doc! { "is_published": false });
        }
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Unknown course status '{}'; use 'published' or 'draft'",
                other
            )))
        }
        None => {}
    }
    filter.default_order("-created_at");

    let courses = Repository::open(collections::COURSES).await?;
    let (documents, total) = courses
        .select_page(&filter, current.access.filter_for(Resource::Course))
        .await?;
    Ok(ApiResponse::success("Courses", to_page(documents, &filter, total)))
}

/// POST /api/courses
pub async fn courses_create(current: CurrentUser, JsonBody(payload): JsonBody<CreateCourseRequest>) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Course)?;
    payload.validate()?;

    let mut document = payload.into_document();
    current.access.stamp(Resource::Course, &mut document);
    if current.role() == Role::Instructor {
        document.insert("instructor_id", current.id().to_hex());
    }
    if let Ok(code) = document.get_str("franchise_code") {
        if FranchiseService::new().await?.find_by_code(code).await?.is_none() {
            return Err(ApiError::bad_request(format!("Franchise '{}' does not exist", code)));
        }
    }
    document.insert("created_by", current.id().to_hex());

    let courses = Repository::open(collections::COURSES).await?;
    let stored = courses.insert_one(document).await?;
    tracing::info!("{} created course {}", current.user.email, stored.get_str("title").unwrap_or_default());
    Ok(ApiResponse::created("Course created", document_to_json(stored)))
}

/// GET /api/courses/:id - course with its ordered modules
pub async fn course_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::Course)?;
    let service = CourseService::new().await?;
    let course = service.course(&current.access, &id).await?;

    let modules = service
        .modules
        .select_any(doc! { "course_id": crate::handlers::id_hex(&course) }, Some(doc! { "order": 1 }))
        .await?;

    let mut body = document_to_json(course);
    body["modules"] = Value::Array(modules.into_iter().map(document_to_json).collect());
    Ok(ApiResponse::success("Course", body))
}

/// PUT /api/courses/:id
pub async fn course_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateCourseRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Course)?;
    payload.validate()?;

    let id = parse_object_id(&id)?;
    let courses = Repository::open(collections::COURSES).await?;
    let scope = current.access.filter_for(Resource::Course);
    let course = courses.select_404(id, scope.clone()).await?;
    current.access.ensure_in_scope(Resource::Course, &course)?;
    ensure_instructor_owns(&current.access, &course)?;

    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let updated = courses.update_404(id, scope, set).await?;
    Ok(ApiResponse::success("Course updated", document_to_json(updated)))
}

/// DELETE /api/courses/:id - removes the course and its content
pub async fn course_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Delete, Resource::Course)?;

    let object_id = parse_object_id(&id)?;
    let id = object_id.to_hex();
    let service = CourseService::new().await?;
    let scope = current.access.filter_for(Resource::Course);
    let course = service.courses.select_404(object_id, scope.clone()).await?;
    current.access.ensure_in_scope(Resource::Course, &course)?;

    let enrolled = Repository::open(collections::ENROLLMENTS)
        .await?
        .count(doc! { "course_id": &id, "status": "active" })
        .await?;
    ensure_deletable(enrolled)?;

    service.courses.delete_404(object_id, scope).await?;
    service.delete_content(&id).await?;
    tracing::info!("{} deleted course {}", current.user.email, id);

    Ok(ApiResponse::success("Course deleted", serde_json::json!({ "id": id })))
}

/// POST /api/courses/:id/publish - body `{ "is_published": false }` unpublishes
pub async fn course_publish(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    payload: Option<JsonBody<PublishRequest>>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Course)?;
    let publish = payload.map(|JsonBody(p)| p.is_published).unwrap_or(true);

    let id = parse_object_id(&id)?;
    let courses = Repository::open(collections::COURSES).await?;
    let scope = current.access.filter_for(Resource::Course);
    let course = courses.select_404(id, scope.clone()).await?;
    current.access.ensure_in_scope(Resource::Course, &course)?;
    ensure_instructor_owns(&current.access, &course)?;

    let mut set = doc! { "is_published": publish };
    if publish {
        set.insert("published_at", now());
    }
    let updated = courses.update_404(id, scope, set).await?;
    let message = if publish { "Course published" } else { "Course unpublished" };
    Ok(ApiResponse::success(message, document_to_json(updated)))
}
