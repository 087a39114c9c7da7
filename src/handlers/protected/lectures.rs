// handlers/protected/lectures.rs - scheduled or recorded lectures of a course
//
// GET/POST /api/courses/:id/lectures, GET/PUT/DELETE /api/lectures/:id

use mongodb::bson::{doc, Document};
use serde_json::{json, Value};

use crate::access::Resource;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::handlers::{id_hex, object_id_of};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam};
use crate::models::course::{CreateLectureRequest, UpdateLectureRequest};
use crate::services::course_service::authorize_authoring;
use crate::services::CourseService;
use crate::types::Operation;

/// Lecture plus a read check on its parent course
async fn load_lecture(
    lectures: &Repository,
    service: &CourseService,
    current: &CurrentUser,
    id: &str,
) -> Result<(Document, Document), ApiError> {
    let lecture = lectures.select_404(parse_object_id(id)?, doc! {}).await?;
    let course = service.parent_course(&current.access, &lecture).await?;
    Ok((lecture, course))
}

/// GET /api/courses/:id/lectures
pub async fn lectures_list(current: CurrentUser, PathParam(course_id): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let course = service.course(&current.access, &course_id).await?;

    let lectures = Repository::open(collections::LECTURES)
        .await?
        .select_any(
            doc! { "course_id": id_hex(&course) },
            Some(doc! { "order": 1, "scheduled_at": 1 }),
        )
        .await?;
    Ok(ApiResponse::success("Lectures", lectures.into_iter().map(document_to_json).collect()))
}

/// POST /api/courses/:id/lectures
pub async fn lectures_create(
    current: CurrentUser,
    PathParam(course_id): PathParam<String>,
    JsonBody(payload): JsonBody<CreateLectureRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let course = service
        .course_for_authoring(&current.access, &course_id, Operation::Create)
        .await?;

    let lectures = Repository::open(collections::LECTURES).await?;
    let stored = lectures.insert_one(payload.into_document(&id_hex(&course))).await?;
    Ok(ApiResponse::created("Lecture created", document_to_json(stored)))
}

/// GET /api/lectures/:id
pub async fn lecture_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let lectures = Repository::open(collections::LECTURES).await?;
    let (lecture, _course) = load_lecture(&lectures, &service, &current, &id).await?;
    Ok(ApiResponse::success("Lecture", document_to_json(lecture)))
}

/// PUT /api/lectures/:id
pub async fn lecture_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateLectureRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let lectures = Repository::open(collections::LECTURES).await?;
    let (lecture, course) = load_lecture(&lectures, &service, &current, &id).await?;
    authorize_authoring(&current.access, Operation::Update, &course)?;

    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let updated = lectures.update_404(object_id_of(&lecture)?, doc! {}, set).await?;
    Ok(ApiResponse::success("Lecture updated", document_to_json(updated)))
}

/// DELETE /api/lectures/:id
pub async fn lecture_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    let service = CourseService::new().await?;
    let lectures = Repository::open(collections::LECTURES).await?;
    let (lecture, course) = load_lecture(&lectures, &service, &current, &id).await?;
    authorize_authoring(&current.access, Operation::Delete, &course)?;

    lectures.delete_404(object_id_of(&lecture)?, doc! {}).await?;
    Ok(ApiResponse::success("Lecture deleted", json!({ "id": id_hex(&lecture) })))
}
