use mongodb::bson::{doc, Bson, Document};

use crate::database::serialize::now;
use crate::database::{collections, DatabaseError, Repository};
use crate::error::ApiError;
use crate::models::enrollment::{progress_percent, EnrollmentStatus};

pub struct EnrollmentService {
    pub enrollments: Repository,
}

impl EnrollmentService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            enrollments: Repository::open(collections::ENROLLMENTS).await?,
        })
    }

    pub async fn find(&self, student_id: &str, course_id: &str) -> Result<Option<Document>, DatabaseError> {
        self.enrollments
            .select_one(doc! { "student_id": student_id, "course_id": course_id })
            .await
    }

    /// 403 unless the student holds an active or completed enrollment
    pub async fn ensure_enrolled(&self, student_id: &str, course_id: &str) -> Result<Document, ApiError> {
        let enrollment = self
            .find(student_id, course_id)
            .await?
            .ok_or_else(|| ApiError::forbidden("You are not enrolled in this course"))?;
        match enrollment.get_str("status").ok().and_then(EnrollmentStatus::parse) {
            Some(EnrollmentStatus::Active) | Some(EnrollmentStatus::Completed) => Ok(enrollment),
            _ => Err(ApiError::forbidden("Your enrollment in this course is not active")),
        }
    }

    /// 409 when the pair already has an enrollment, cancelled ones included
    pub fn ensure_not_enrolled(existing: Option<&Document>) -> Result<(), ApiError> {
        match existing {
            Some(_) => Err(ApiError::conflict("Student is already enrolled in this course")),
            None => Ok(()),
        }
    }

    /// Enrollment document for a new (student, course) pair
    pub fn new_enrollment(student_id: &str, course: &Document) -> Document {
        let mut document = doc! {
            "student_id": student_id,
            "course_id": course.get_object_id("_id").map(|id| id.to_hex()).unwrap_or_default(),
            "status": EnrollmentStatus::Active.as_str(),
            "completed_lessons": Bson::Array(vec![]),
            "progress": 0,
            "enrolled_at": now(),
        };
        if let Ok(title) = course.get_str("title") {
            document.insert("course_title", title);
        }
        document
    }

    /// `$set` fields after `lesson_id` is completed out of `course_lessons`
    pub fn progress_update(enrollment: &Document, lesson_id: &str, course_lessons: &[String]) -> Document {
        let mut completed: Vec<String> = enrollment
            .get_array("completed_lessons")
            .map(|items| items.iter().filter_map(|b| b.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if !completed.iter().any(|l| l == lesson_id) {
            completed.push(lesson_id.to_string());
        }
        // Lessons deleted since completion no longer count
        completed.retain(|l| course_lessons.contains(l));

        let progress = progress_percent(completed.len(), course_lessons.len());
        let mut set = doc! {
            "completed_lessons": completed,
            "progress": progress,
        };
        if progress >= 100 {
            set.insert("status", EnrollmentStatus::Completed.as_str());
            if !enrollment.contains_key("completed_at") {
                set.insert("completed_at", now());
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    fn lessons() -> Vec<String> {
        vec!["l1".into(), "l2".into(), "l3".into(), "l4".into()]
    }

    #[test]
    fn new_enrollment_starts_active() {
        let course_id = ObjectId::new();
        let document = EnrollmentService::new_enrollment("s1", &doc! { "_id": course_id, "title": "Rust" });
        assert_eq!(document.get_str("course_id").unwrap(), course_id.to_hex());
        assert_eq!(document.get_str("status").unwrap(), "active");
        assert_eq!(document.get_i32("progress").unwrap(), 0);
    }

    #[test]
    fn one_enrollment_per_student_and_course() {
        assert!(EnrollmentService::ensure_not_enrolled(None).is_ok());

        for status in ["active", "completed", "cancelled"] {
            let existing = doc! { "student_id": "s1", "course_id": "c1", "status": status };
            let err = EnrollmentService::ensure_not_enrolled(Some(&existing)).unwrap_err();
            assert_eq!(err.status_code(), 409);
        }
    }

    #[test]
    fn completing_lessons_updates_progress() {
        let enrollment = doc! { "completed_lessons": ["l1"] };
        let set = EnrollmentService::progress_update(&enrollment, "l2", &lessons());
        assert_eq!(set.get_i32("progress").unwrap(), 50);
        assert_eq!(set.get_array("completed_lessons").unwrap().len(), 2);
        assert!(!set.contains_key("status"));
    }

    #[test]
    fn repeated_completion_is_idempotent() {
        let enrollment = doc! { "completed_lessons": ["l1", "l2"] };
        let set = EnrollmentService::progress_update(&enrollment, "l2", &lessons());
        assert_eq!(set.get_array("completed_lessons").unwrap().len(), 2);
        assert_eq!(set.get_i32("progress").unwrap(), 50);
    }

    #[test]
    fn final_lesson_completes_enrollment() {
        let enrollment = doc! { "completed_lessons": ["l1", "l2", "l3", "gone"] };
        let set = EnrollmentService::progress_update(&enrollment, "l4", &lessons());
        assert_eq!(set.get_i32("progress").unwrap(), 100);
        assert_eq!(set.get_str("status").unwrap(), "completed");
        assert!(set.get_datetime("completed_at").is_ok());
        assert_eq!(set.get_array("completed_lessons").unwrap().len(), 4);
    }
}
