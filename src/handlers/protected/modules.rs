// handlers/protected/modules.rs - course modules and their lessons
//
// GET/POST /api/courses/:id/modules, PUT/DELETE /api/modules/:id
// GET/POST /api/modules/:id/lessons, PUT/DELETE /api/lessons/:id

use mongodb::bson::{doc, Document};
use serde_json::{json, Value};

use crate::access::Resource;
use crate::database::{document_to_json, parse_object_id};
use crate::error::ApiError;
use crate::handlers::{id_hex, object_id_of};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam};
use crate::models::course::{CreateLessonRequest, CreateModuleRequest, UpdateLessonRequest, UpdateModuleRequest};
use crate::services::course_service::authorize_authoring;
use crate::services::CourseService;
use crate::types::Operation;

fn by_order() -> Option<Document> {
    Some(doc! { "order": 1, "_id": 1 })
}

/// GET /api/courses/:id/modules - modules in order, each with its lessons
pub async fn modules_list(current: CurrentUser, PathParam(course_id): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let course = service.course(&current.access, &course_id).await?;
    let course_id = id_hex(&course);

    let modules = service.modules.select_any(doc! { "course_id": &course_id }, by_order()).await?;
    let lessons = service.lessons.select_any(doc! { "course_id": &course_id }, by_order()).await?;

    let items = modules
        .into_iter()
        .map(|module| {
            let module_id = id_hex(&module);
            let module_lessons: Vec<Value> = lessons
                .iter()
                .filter(|l| l.get_str("module_id").ok() == Some(module_id.as_str()))
                .cloned()
                .map(document_to_json)
                .collect();
            let mut body = document_to_json(module);
            body["lessons"] = Value::Array(module_lessons);
            body
        })
        .collect();

    Ok(ApiResponse::success("Modules", items))
}

/// POST /api/courses/:id/modules
pub async fn modules_create(
    current: CurrentUser,
    PathParam(course_id): PathParam<String>,
    JsonBody(payload): JsonBody<CreateModuleRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let course = service
        .course_for_authoring(&current.access, &course_id, Operation::Create)
        .await?;

    let stored = service.modules.insert_one(payload.into_document(&id_hex(&course))).await?;
    Ok(ApiResponse::created("Module created", document_to_json(stored)))
}

/// PUT /api/modules/:id
pub async fn module_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateModuleRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let (module, course) = service.module(&current.access, &id).await?;
    authorize_authoring(&current.access, Operation::Update, &course)?;

    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let updated = service.modules.update_404(object_id_of(&module)?, doc! {}, set).await?;
    Ok(ApiResponse::success("Module updated", document_to_json(updated)))
}

/// DELETE /api/modules/:id - removes the module and its lessons
pub async fn module_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    let service = CourseService::new().await?;
    let (module, course) = service.module(&current.access, &id).await?;
    authorize_authoring(&current.access, Operation::Delete, &course)?;

    let module_id = id_hex(&module);
    service.modules.delete_404(object_id_of(&module)?, doc! {}).await?;
    let lessons = service.lessons.delete_many(doc! { "module_id": &module_id }).await?;

    Ok(ApiResponse::success(
        "Module deleted",
        json!({ "id": module_id, "lessons_deleted": lessons }),
    ))
}

/// GET /api/modules/:id/lessons
pub async fn lessons_list(current: CurrentUser, PathParam(module_id): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let (module, _course) = service.module(&current.access, &module_id).await?;

    let lessons = service
        .lessons
        .select_any(doc! { "module_id": id_hex(&module) }, by_order())
        .await?;
    Ok(ApiResponse::success("Lessons", lessons.into_iter().map(document_to_json).collect()))
}

/// POST /api/modules/:id/lessons
pub async fn lessons_create(
    current: CurrentUser,
    PathParam(module_id): PathParam<String>,
    JsonBody(payload): JsonBody<CreateLessonRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let (module, course) = service.module(&current.access, &module_id).await?;
    authorize_authoring(&current.access, Operation::Create, &course)?;

    let document = payload.into_document(&id_hex(&module), &id_hex(&course));
    let stored = service.lessons.insert_one(document).await?;
    Ok(ApiResponse::created("Lesson created", document_to_json(stored)))
}

async fn lesson_with_course(
    service: &CourseService,
    current: &CurrentUser,
    id: &str,
    op: Operation,
) -> Result<Document, ApiError> {
    let lesson = service.lessons.select_404(parse_object_id(id)?, doc! {}).await?;
    let course = service.parent_course(&current.access, &lesson).await?;
    authorize_authoring(&current.access, op, &course)?;
    Ok(lesson)
}

/// PUT /api/lessons/:id
pub async fn lesson_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateLessonRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let lesson = lesson_with_course(&service, &current, &id, Operation::Update).await?;

    let set = payload.to_set_document();
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let updated = service.lessons.update_404(object_id_of(&lesson)?, doc! {}, set).await?;
    Ok(ApiResponse::success("Lesson updated", document_to_json(updated)))
}

/// DELETE /api/lessons/:id
pub async fn lesson_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    let service = CourseService::new().await?;
    let lesson = lesson_with_course(&service, &current, &id, Operation::Delete).await?;

    service.lessons.delete_404(object_id_of(&lesson)?, doc! {}).await?;
    Ok(ApiResponse::success("Lesson deleted", json!({ "id": id_hex(&lesson) })))
}
