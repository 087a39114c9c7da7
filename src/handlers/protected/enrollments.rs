// handlers/protected/enrollments.rs - course enrollment and lesson progress
//
// GET/POST /api/enrollments, GET /api/enrollments/:id
// POST /api/enrollments/:id/progress, POST /api/enrollments/:id/cancel

use mongodb::bson::{doc, Document};
use serde_json::Value;

use crate::access::{Resource, Role};
use crate::database::serialize::now;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::{id_hex, object_id_of, to_page};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::enrollment::{CreateEnrollmentRequest, EnrollmentStatus, ProgressRequest};
use crate::models::FieldErrors;
use crate::services::{CourseService, EnrollmentService};
use crate::types::Operation;

fn status_of(enrollment: &Document) -> Option<EnrollmentStatus> {
    enrollment.get_str("status").ok().and_then(EnrollmentStatus::parse)
}

async fn load_enrollment(
    service: &EnrollmentService,
    current: &CurrentUser,
    id: &str,
) -> Result<Document, ApiError> {
    let enrollment = service
        .enrollments
        .select_404(parse_object_id(id)?, current.access.filter_for(Resource::Enrollment))
        .await?;
    Ok(enrollment)
}

/// GET /api/enrollments - `status=active|completed|cancelled`
pub async fn enrollments_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Enrollment)?;

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, &["course_title"])?;
    if let Some(status) = status {
        let status = EnrollmentStatus::parse(&status)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown enrollment status '{}'", status)))?;
        filter.and_where(doc! { "status": status.as_str() });
    }
    filter.default_order("-enrolled_at");

    let service = EnrollmentService::new().await?;
    let (documents, total) = service
        .enrollments
        .select_page(&filter, current.access.filter_for(Resource::Enrollment))
        .await?;
    Ok(ApiResponse::success("Enrollments", to_page(documents, &filter, total)))
}

/**
 * POST /api/enrollments - enroll in a published course
 *
 * Students always enroll themselves. Staff name the student with
 * `student_id`; the student must be visible to them. Tenancy is copied from
 * the student so branch staff see the enrollment afterwards.
 */
pub async fn enrollments_create(
    current: CurrentUser,
    JsonBody(payload): JsonBody<CreateEnrollmentRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Enrollment)?;
    payload.validate()?;

    let users = Repository::open(collections::USERS).await?;
    let student = match (&payload.student_id, current.role()) {
        (Some(id), Role::Student) if *id != current.id().to_hex() => {
            return Err(ApiError::forbidden("Students may only enroll themselves"));
        }
        (_, Role::Student) => users.select_404(current.id(), doc! {}).await?,
        (Some(id), _) => {
            users
                .select_404(parse_object_id(id)?, current.access.filter_for(Resource::User))
                .await?
        }
        (None, _) => {
            return Err(FieldErrors::single("student_id", "Staff must name the student to enroll"));
        }
    };
    if student.get_str("role").ok() != Some(Role::Student.as_str()) {
        return Err(ApiError::bad_request("Only students can be enrolled in courses"));
    }
    let student_id = id_hex(&student);

    let courses = CourseService::new().await?;
    let course = courses.course(&current.access, &payload.course_id).await?;
    if !course.get_bool("is_published").unwrap_or(false) {
        return Err(ApiError::bad_request("Course is not published"));
    }
    let course_id = id_hex(&course);

    let service = EnrollmentService::new().await?;
    EnrollmentService::ensure_not_enrolled(service.find(&student_id, &course_id).await?.as_ref())?;

    let mut document = EnrollmentService::new_enrollment(&student_id, &course);
    for key in ["franchise_code", "branch_code"] {
        if let Ok(code) = student.get_str(key) {
            document.insert(key, code);
        }
    }

    let stored = service.enrollments.insert_one(document).await?;
    tracing::info!("Enrolled student {} in course {}", student_id, course_id);
    Ok(ApiResponse::created("Enrolled", document_to_json(stored)))
}

/// GET /api/enrollments/:id
pub async fn enrollment_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::Enrollment)?;
    let service = EnrollmentService::new().await?;
    let enrollment = load_enrollment(&service, &current, &id).await?;
    Ok(ApiResponse::success("Enrollment", document_to_json(enrollment)))
}

/// POST /api/enrollments/:id/progress - mark one lesson complete
pub async fn enrollment_progress(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<ProgressRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Enrollment)?;
    payload.validate()?;

    let service = EnrollmentService::new().await?;
    let enrollment = load_enrollment(&service, &current, &id).await?;
    if status_of(&enrollment) == Some(EnrollmentStatus::Cancelled) {
        return Err(ApiError::bad_request("Enrollment is cancelled"));
    }

    let course_id = enrollment.get_str("course_id").unwrap_or_default();
    let lessons = CourseService::new().await?.lesson_ids(course_id).await?;
    let lesson_id = payload.lesson_id.to_lowercase();
    if !lessons.contains(&lesson_id) {
        return Err(FieldErrors::single("lesson_id", "Lesson does not belong to this course"));
    }

    let set = EnrollmentService::progress_update(&enrollment, &lesson_id, &lessons);
    let updated = service
        .enrollments
        .update_404(object_id_of(&enrollment)?, current.access.filter_for(Resource::Enrollment), set)
        .await?;
    Ok(ApiResponse::success("Progress updated", document_to_json(updated)))
}

/// POST /api/enrollments/:id/cancel
pub async fn enrollment_cancel(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::Enrollment)?;
    let service = EnrollmentService::new().await?;
    let enrollment = load_enrollment(&service, &current, &id).await?;
    if status_of(&enrollment) != Some(EnrollmentStatus::Active) {
        return Err(ApiError::bad_request("Only active enrollments can be cancelled"));
    }

    let set = doc! { "status": EnrollmentStatus::Cancelled.as_str(), "cancelled_at": now() };
    let updated = service
        .enrollments
        .update_404(object_id_of(&enrollment)?, current.access.filter_for(Resource::Enrollment), set)
        .await?;
    tracing::info!("{} cancelled enrollment {}", current.user.email, id_hex(&updated));
    Ok(ApiResponse::success("Enrollment cancelled", document_to_json(updated)))
}
