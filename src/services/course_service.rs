use mongodb::bson::{doc, Document};

use crate::access::{BranchAccessManager, Resource, Role};
use crate::database::{collections, parse_object_id, DatabaseError, Repository};
use crate::error::ApiError;
use crate::types::Operation;

/// Instructors may only change courses they teach
pub fn ensure_instructor_owns(access: &BranchAccessManager, course: &Document) -> Result<(), ApiError> {
    if access.role() != Role::Instructor {
        return Ok(());
    }
    match course.get_str("instructor_id") {
        Ok(id) if id == access.user_id().to_hex() => Ok(()),
        _ => Err(ApiError::forbidden("Instructors may only modify their own courses")),
    }
}

/// Write check for content under an already loaded course
pub fn authorize_authoring(access: &BranchAccessManager, op: Operation, course: &Document) -> Result<(), ApiError> {
    access.require(op, Resource::CourseContent)?;
    access.ensure_in_scope(Resource::Course, course)?;
    ensure_instructor_owns(access, course)
}

/// Collections whose documents belong to a course through `course_id`
pub const CONTENT_COLLECTIONS: [&str; 4] = [
    collections::MODULES,
    collections::LESSONS,
    collections::LECTURES,
    collections::QUIZZES,
];

/// Courses with active learners are unpublished, not deleted
pub fn ensure_deletable(active_enrollments: u64) -> Result<(), ApiError> {
    if active_enrollments > 0 {
        return Err(ApiError::conflict(format!(
            "Course has {} active enrollments; unpublish it instead",
            active_enrollments
        )));
    }
    Ok(())
}

/// Resolves course content through the parent course, which carries tenancy
pub struct CourseService {
    pub courses: Repository,
    pub modules: Repository,
    pub lessons: Repository,
}

impl CourseService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            courses: Repository::open(collections::COURSES).await?,
            modules: Repository::open(collections::MODULES).await?,
            lessons: Repository::open(collections::LESSONS).await?,
        })
    }

    /// Course visible to the caller, or 404
    pub async fn course(&self, access: &BranchAccessManager, course_id: &str) -> Result<Document, ApiError> {
        let id = parse_object_id(course_id)?;
        Ok(self.courses.select_404(id, access.filter_for(Resource::Course)).await?)
    }

    /// Course the caller may add or change content under
    pub async fn course_for_authoring(
        &self,
        access: &BranchAccessManager,
        course_id: &str,
        op: Operation,
    ) -> Result<Document, ApiError> {
        access.require(op, Resource::CourseContent)?;
        let course = self.course(access, course_id).await?;
        authorize_authoring(access, op, &course)?;
        Ok(course)
    }

    /// Check a content document's parent course is in scope
    pub async fn parent_course(
        &self,
        access: &BranchAccessManager,
        content: &Document,
    ) -> Result<Document, ApiError> {
        let course_id = content
            .get_str("course_id")
            .map_err(|_| ApiError::internal_server_error("Content record has no course_id"))?;
        self.course(access, course_id).await
    }

    /// Module plus its course, both checked against the caller's scope
    pub async fn module(
        &self,
        access: &BranchAccessManager,
        module_id: &str,
    ) -> Result<(Document, Document), ApiError> {
        let id = parse_object_id(module_id)?;
        let module = self.modules.select_404(id, doc! {}).await?;
        let course = self.parent_course(access, &module).await?;
        Ok((module, course))
    }

    pub async fn lesson_ids(&self, course_id: &str) -> Result<Vec<String>, DatabaseError> {
        let lessons = self
            .lessons
            .select_any(doc! { "course_id": course_id }, None)
            .await?;
        Ok(lessons
            .iter()
            .filter_map(|l| l.get_object_id("_id").ok().map(|id| id.to_hex()))
            .collect())
    }

    /// Remove everything in [`CONTENT_COLLECTIONS`] after the course is deleted
    pub async fn delete_content(&self, course_id: &str) -> Result<(), DatabaseError> {
        let mut removed = 0;
        for collection in CONTENT_COLLECTIONS {
            removed += Repository::open(collection)
                .await?
                .delete_many(doc! { "course_id": course_id })
                .await?;
        }
        tracing::info!("Removed {} content records of course {}", removed, course_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn instructors_author_only_their_courses() {
        let me = ObjectId::new();
        let access = BranchAccessManager::for_user(Role::Instructor, me, Some("NORTH"), Some("B1")).unwrap();
        let mine = doc! { "franchise_code": "NORTH", "branch_code": "B1", "instructor_id": me.to_hex() };
        let theirs = doc! { "franchise_code": "NORTH", "branch_code": "B1", "instructor_id": ObjectId::new().to_hex() };

        assert!(authorize_authoring(&access, Operation::Update, &mine).is_ok());
        assert_eq!(authorize_authoring(&access, Operation::Update, &theirs).unwrap_err().status_code(), 403);
    }

    #[test]
    fn active_enrollments_block_deletion() {
        assert!(ensure_deletable(0).is_ok());
        let err = ensure_deletable(3).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(err.message().contains("3 active enrollments"));
    }

    #[test]
    fn deletion_cascades_to_all_course_content() {
        for collection in [collections::MODULES, collections::LESSONS, collections::LECTURES, collections::QUIZZES] {
            assert!(CONTENT_COLLECTIONS.contains(&collection), "{collection} is not cascaded");
        }
        assert!(!CONTENT_COLLECTIONS.contains(&collections::QUIZ_ATTEMPTS));
        assert!(!CONTENT_COLLECTIONS.contains(&collections::ENROLLMENTS));
    }

    #[test]
    fn students_cannot_author_and_other_franchises_are_hidden() {
        let student = BranchAccessManager::for_user(Role::Student, ObjectId::new(), Some("NORTH"), None).unwrap();
        let course = doc! { "franchise_code": "NORTH", "is_published": true };
        assert_eq!(authorize_authoring(&student, Operation::Create, &course).unwrap_err().status_code(), 403);

        let admin = BranchAccessManager::for_user(Role::FranchiseAdmin, ObjectId::new(), Some("NORTH"), None).unwrap();
        let elsewhere = doc! { "franchise_code": "SOUTH" };
        assert_eq!(authorize_authoring(&admin, Operation::Update, &elsewhere).unwrap_err().status_code(), 404);
        assert!(authorize_authoring(&admin, Operation::Delete, &course).is_ok());
    }
}
