use serde::{Deserialize, Serialize};

use super::validation::FieldErrors;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnrollmentStatus::Active),
            "completed" => Some(EnrollmentStatus::Completed),
            "cancelled" => Some(EnrollmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub course_id: String,
    /// Staff may enroll a student; students always enroll themselves
    pub student_id: Option<String>,
}

impl CreateEnrollmentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.object_id("course_id", &self.course_id);
        if let Some(student) = &self.student_id {
            errors.object_id("student_id", student);
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub lesson_id: String,
}

impl ProgressRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.object_id("lesson_id", &self.lesson_id);
        errors.finish()
    }
}

/// Whole-number completion percentage, clamped to 0..=100
pub fn progress_percent(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let percent = (completed as f64 / total as f64 * 100.0).round() as i32;
    percent.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_and_clamps() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(5, 3), 100);
    }

    #[test]
    fn status_strings() {
        assert_eq!(EnrollmentStatus::parse("cancelled"), Some(EnrollmentStatus::Cancelled));
        assert_eq!(EnrollmentStatus::parse("paused"), None);
        assert_eq!(EnrollmentStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn enrollment_ids_must_be_object_ids() {
        let request = CreateEnrollmentRequest {
            course_id: "abc".into(),
            student_id: Some("also-bad".into()),
        };
        let body = request.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["course_id"].is_string());
        assert!(body["field_errors"]["student_id"].is_string());
    }
}
