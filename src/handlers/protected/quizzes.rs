// handlers/protected/quizzes.rs - quizzes, attempts and grading
//
// GET/POST /api/courses/:id/quizzes, GET/PUT/DELETE /api/quizzes/:id
// GET/POST /api/quizzes/:id/attempts

use mongodb::bson::{doc, Bson, Document};
use serde_json::{json, Value};

use crate::access::Resource;
use crate::database::serialize::now;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::handlers::{id_hex, object_id_of};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam};
use crate::models::quiz::{
    attempt_limit_reached, attempt_slot_query, check_attempt_limit, grade, stored_questions, strip_answers,
    CreateQuizRequest, SubmitAttemptRequest, UpdateQuizRequest,
};
use crate::services::course_service::authorize_authoring;
use crate::services::{CourseService, EnrollmentService};
use crate::types::Operation;

/// Content authors see answer keys and drafts; everyone else sees neither
fn sees_answers(current: &CurrentUser) -> bool {
    current.role().can_author_content()
}

async fn load_quiz(
    quizzes: &Repository,
    service: &CourseService,
    current: &CurrentUser,
    id: &str,
) -> Result<(Document, Document), ApiError> {
    let quiz = quizzes.select_404(parse_object_id(id)?, doc! {}).await?;
    let course = service.parent_course(&current.access, &quiz).await?;
    if !sees_answers(current) && !quiz.get_bool("is_published").unwrap_or(false) {
        return Err(ApiError::not_found("Quiz record not found"));
    }
    Ok((quiz, course))
}

/// GET /api/courses/:id/quizzes
pub async fn quizzes_list(current: CurrentUser, PathParam(course_id): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let course = service.course(&current.access, &course_id).await?;

    let mut query = doc! { "course_id": id_hex(&course) };
    let authoring = sees_answers(&current);
    if !authoring {
        query.insert("is_published", true);
    }

    let quizzes = Repository::open(collections::QUIZZES)
        .await?
        .select_any(query, Some(doc! { "created_at": 1 }))
        .await?;
    let items = quizzes
        .into_iter()
        .map(|quiz| if authoring { quiz } else { strip_answers(quiz) })
        .map(document_to_json)
        .collect();
    Ok(ApiResponse::success("Quizzes", items))
}

/// POST /api/courses/:id/quizzes
pub async fn quizzes_create(
    current: CurrentUser,
    PathParam(course_id): PathParam<String>,
    JsonBody(payload): JsonBody<CreateQuizRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let course = service
        .course_for_authoring(&current.access, &course_id, Operation::Create)
        .await?;

    let quizzes = Repository::open(collections::QUIZZES).await?;
    let stored = quizzes.insert_one(payload.into_document(&id_hex(&course))?).await?;
    Ok(ApiResponse::created("Quiz created", document_to_json(stored)))
}

/// GET /api/quizzes/:id
pub async fn quiz_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::CourseContent)?;
    let service = CourseService::new().await?;
    let quizzes = Repository::open(collections::QUIZZES).await?;
    let (quiz, _course) = load_quiz(&quizzes, &service, &current, &id).await?;

    let quiz = if sees_answers(&current) { quiz } else { strip_answers(quiz) };
    Ok(ApiResponse::success("Quiz", document_to_json(quiz)))
}

/// PUT /api/quizzes/:id
pub async fn quiz_update(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<UpdateQuizRequest>,
) -> ApiResult<Value> {
    payload.validate()?;
    let service = CourseService::new().await?;
    let quizzes = Repository::open(collections::QUIZZES).await?;
    let (quiz, course) = load_quiz(&quizzes, &service, &current, &id).await?;
    authorize_authoring(&current.access, Operation::Update, &course)?;

    let set = payload.to_set_document()?;
    if set.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    let updated = quizzes.update_404(object_id_of(&quiz)?, doc! {}, set).await?;
    Ok(ApiResponse::success("Quiz updated", document_to_json(updated)))
}

/// DELETE /api/quizzes/:id - attempts are kept for the record
pub async fn quiz_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    let service = CourseService::new().await?;
    let quizzes = Repository::open(collections::QUIZZES).await?;
    let (quiz, course) = load_quiz(&quizzes, &service, &current, &id).await?;
    authorize_authoring(&current.access, Operation::Delete, &course)?;

    quizzes.delete_404(object_id_of(&quiz)?, doc! {}).await?;
    Ok(ApiResponse::success("Quiz deleted", json!({ "id": id_hex(&quiz) })))
}

/**
 * POST /api/quizzes/:id/attempts - grade and record one attempt
 *
 * The caller must hold an active or completed enrollment in the quiz's
 * course. Attempts beyond `max_attempts` are rejected with 409.
 */
pub async fn attempts_create(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<SubmitAttemptRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::QuizAttempt)?;
    let service = CourseService::new().await?;
    let quizzes = Repository::open(collections::QUIZZES).await?;
    let (quiz, course) = load_quiz(&quizzes, &service, &current, &id).await?;
    if !quiz.get_bool("is_published").unwrap_or(false) {
        return Err(ApiError::bad_request("Quiz is not published"));
    }

    let questions = stored_questions(&quiz)?;
    if questions.is_empty() {
        return Err(ApiError::bad_request("Quiz has no questions"));
    }

    let student_id = current.id().to_hex();
    let quiz_id = id_hex(&quiz);
    let course_id = id_hex(&course);
    EnrollmentService::new()
        .await?
        .ensure_enrolled(&student_id, &course_id)
        .await?;

    // The count is a fast path; the counter reservation is authoritative
    let max_attempts = quiz.get_i32("max_attempts").ok();
    let key = doc! { "quiz_id": &quiz_id, "student_id": &student_id };
    let attempts = Repository::open(collections::QUIZ_ATTEMPTS).await?;
    let counters = Repository::open(collections::QUIZ_ATTEMPT_COUNTERS).await?;
    let used = attempts.count(key.clone()).await?;
    check_attempt_limit(max_attempts, used)?;
    counters.seed_one(key.clone(), doc! { "used": used as i64 }).await?;
    let reserved = counters
        .modify_one(
            attempt_slot_query(key.clone(), max_attempts),
            doc! { "$inc": { "used": 1 }, "$set": { "updated_at": now() } },
        )
        .await?;
    if let (None, Some(max)) = (&reserved, max_attempts) {
        return Err(attempt_limit_reached(max));
    }

    let passing_score = quiz.get_f64("passing_score").unwrap_or(0.0);
    let result = grade(&questions, &payload.answers, passing_score);
    let answers: Vec<Bson> = payload
        .answers
        .iter()
        .map(|a| a.map(|i| Bson::Int64(i as i64)).unwrap_or(Bson::Null))
        .collect();

    let mut document = doc! {
        "quiz_id": &quiz_id,
        "course_id": &course_id,
        "student_id": &student_id,
        "answers": answers,
        "score": result.score as i64,
        "max_score": result.max_score as i64,
        "percentage": result.percentage,
        "passed": result.passed,
        "submitted_at": now(),
    };
    current.access.stamp(Resource::QuizAttempt, &mut document);

    let stored = match attempts.insert_one(document).await {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(release) = counters.modify_one(key, doc! { "$inc": { "used": -1 } }).await {
                tracing::error!("Failed to release attempt slot on quiz {}: {}", quiz_id, release);
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        "{} scored {}/{} on quiz {}",
        current.user.email,
        result.score,
        result.max_score,
        quiz_id
    );
    let message = if result.passed { "Quiz passed" } else { "Quiz submitted" };
    Ok(ApiResponse::created(message, document_to_json(stored)))
}

/// GET /api/quizzes/:id/attempts - own attempts for students, scoped for staff
pub async fn attempts_list(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Vec<Value>> {
    current.access.require(Operation::Read, Resource::QuizAttempt)?;
    let service = CourseService::new().await?;
    let quizzes = Repository::open(collections::QUIZZES).await?;
    let (quiz, _course) = load_quiz(&quizzes, &service, &current, &id).await?;

    let query = current
        .access
        .scoped(Resource::QuizAttempt, doc! { "quiz_id": id_hex(&quiz) });
    let attempts = Repository::open(collections::QUIZ_ATTEMPTS)
        .await?
        .select_any(query, Some(doc! { "submitted_at": -1 }))
        .await?;
    Ok(ApiResponse::success("Quiz attempts", attempts.into_iter().map(document_to_json).collect()))
}
