use mongodb::bson::{doc, Bson, Document};
use serde::Deserialize;

use super::validation::FieldErrors;
use crate::database::serialize::to_bson_datetime;
use crate::error::ApiError;

pub const COURSE_LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub price: f64,
    pub instructor_id: Option<String>,
    pub thumbnail: Option<String>,
    /// Global callers may pin a course to a franchise; absent means catalogue-wide
    pub franchise_code: Option<String>,
    /// `false` asks branch staff's course to be franchise-wide
    #[serde(default = "default_true")]
    pub branch_only: bool,
}

fn default_true() -> bool {
    true
}

fn check_level(errors: &mut FieldErrors, level: Option<&str>) {
    if let Some(level) = level {
        if !COURSE_LEVELS.contains(&level) {
            errors.add("level", format!("Level must be one of: {}", COURSE_LEVELS.join(", ")));
        }
    }
}

impl CreateCourseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 3, 200);
        errors.text("description", &self.description, 10, 10_000);
        errors.optional_text("category", self.category.as_deref(), 100);
        check_level(&mut errors, self.level.as_deref());
        errors.range("price", self.price, 0.0, 1_000_000.0);
        if let Some(id) = &self.instructor_id {
            errors.object_id("instructor_id", id);
        }
        errors.finish()
    }

    pub fn into_document(self) -> Document {
        let mut document = doc! {
            "title": self.title.trim(),
            "description": self.description,
            "price": self.price,
            "is_published": false,
        };
        if let Some(category) = self.category {
            document.insert("category", category);
        }
        if let Some(level) = self.level {
            document.insert("level", level);
        }
        if let Some(instructor) = self.instructor_id {
            document.insert("instructor_id", instructor.trim());
        }
        if let Some(thumbnail) = self.thumbnail {
            document.insert("thumbnail", thumbnail);
        }
        if let Some(code) = self.franchise_code {
            document.insert("franchise_code", super::franchise::normalize_code(&code));
        }
        if !self.branch_only {
            document.insert("branch_code", Bson::Null);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub price: Option<f64>,
    pub instructor_id: Option<String>,
    pub thumbnail: Option<String>,
}

impl UpdateCourseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 3, 200);
        }
        if let Some(description) = &self.description {
            errors.text("description", description, 10, 10_000);
        }
        errors.optional_text("category", self.category.as_deref(), 100);
        check_level(&mut errors, self.level.as_deref());
        if let Some(price) = self.price {
            errors.range("price", price, 0.0, 1_000_000.0);
        }
        if let Some(id) = &self.instructor_id {
            errors.object_id("instructor_id", id);
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.clone());
        }
        if let Some(category) = &self.category {
            set.insert("category", category.clone());
        }
        if let Some(level) = &self.level {
            set.insert("level", level.clone());
        }
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(instructor) = &self.instructor_id {
            set.insert("instructor_id", instructor.trim());
        }
        if let Some(thumbnail) = &self.thumbnail {
            set.insert("thumbnail", thumbnail.clone());
        }
        set
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateModuleRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
}

impl CreateModuleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 2, 200);
        errors.optional_text("description", self.description.as_deref(), 5_000);
        if self.order < 0 {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn into_document(self, course_id: &str) -> Document {
        let mut document = doc! {
            "course_id": course_id,
            "title": self.title.trim(),
            "order": self.order,
        };
        if let Some(description) = self.description {
            document.insert("description", description);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateModuleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
}

impl UpdateModuleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 2, 200);
        }
        errors.optional_text("description", self.description.as_deref(), 5_000);
        if matches!(self.order, Some(order) if order < 0) {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.clone());
        }
        if let Some(order) = self.order {
            set.insert("order", order);
        }
        set
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLessonRequest {
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub order: i32,
}

fn check_duration(errors: &mut FieldErrors, minutes: Option<i32>) {
    if matches!(minutes, Some(m) if !(0..=24 * 60).contains(&m)) {
        errors.add("duration_minutes", "Duration must be between 0 and 1440 minutes");
    }
}

fn check_url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if url::Url::parse(value).is_err() && !value.starts_with('/') {
            errors.add(field, "Must be an absolute URL or a server path");
        }
    }
}

impl CreateLessonRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 2, 200);
        errors.optional_text("content", self.content.as_deref(), 100_000);
        check_url(&mut errors, "video_url", self.video_url.as_deref());
        check_duration(&mut errors, self.duration_minutes);
        if self.order < 0 {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn into_document(self, module_id: &str, course_id: &str) -> Document {
        let mut document = doc! {
            "module_id": module_id,
            "course_id": course_id,
            "title": self.title.trim(),
            "order": self.order,
        };
        if let Some(content) = self.content {
            document.insert("content", content);
        }
        if let Some(url) = self.video_url {
            document.insert("video_url", url);
        }
        if let Some(minutes) = self.duration_minutes {
            document.insert("duration_minutes", minutes);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub order: Option<i32>,
}

impl UpdateLessonRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 2, 200);
        }
        errors.optional_text("content", self.content.as_deref(), 100_000);
        check_url(&mut errors, "video_url", self.video_url.as_deref());
        check_duration(&mut errors, self.duration_minutes);
        if matches!(self.order, Some(order) if order < 0) {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(content) = &self.content {
            set.insert("content", content.clone());
        }
        if let Some(url) = &self.video_url {
            set.insert("video_url", url.clone());
        }
        if let Some(minutes) = self.duration_minutes {
            set.insert("duration_minutes", minutes);
        }
        if let Some(order) = self.order {
            set.insert("order", order);
        }
        set
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLectureRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub order: i32,
}

impl CreateLectureRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 2, 200);
        errors.optional_text("description", self.description.as_deref(), 5_000);
        check_url(&mut errors, "video_url", self.video_url.as_deref());
        check_duration(&mut errors, self.duration_minutes);
        if self.order < 0 {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn into_document(self, course_id: &str) -> Document {
        let mut document = doc! {
            "course_id": course_id,
            "title": self.title.trim(),
            "order": self.order,
        };
        if let Some(description) = self.description {
            document.insert("description", description);
        }
        if let Some(url) = self.video_url {
            document.insert("video_url", url);
        }
        if let Some(at) = self.scheduled_at {
            document.insert("scheduled_at", to_bson_datetime(at));
        }
        if let Some(minutes) = self.duration_minutes {
            document.insert("duration_minutes", minutes);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLectureRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_minutes: Option<i32>,
    pub order: Option<i32>,
}

impl UpdateLectureRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 2, 200);
        }
        errors.optional_text("description", self.description.as_deref(), 5_000);
        check_url(&mut errors, "video_url", self.video_url.as_deref());
        check_duration(&mut errors, self.duration_minutes);
        if matches!(self.order, Some(order) if order < 0) {
            errors.add("order", "Order cannot be negative");
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.clone());
        }
        if let Some(url) = &self.video_url {
            set.insert("video_url", url.clone());
        }
        if let Some(at) = self.scheduled_at {
            set.insert("scheduled_at", to_bson_datetime(at));
        }
        if let Some(minutes) = self.duration_minutes {
            set.insert("duration_minutes", minutes);
        }
        if let Some(order) = self.order {
            set.insert("order", order);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> CreateCourseRequest {
        CreateCourseRequest {
            title: "Rust for Schools".into(),
            description: "Ownership, borrowing and traits".into(),
            category: Some("programming".into()),
            level: Some("beginner".into()),
            price: 49.0,
            instructor_id: None,
            thumbnail: None,
            franchise_code: None,
            branch_only: true,
        }
    }

    #[test]
    fn new_courses_are_unpublished() {
        let document = course().into_document();
        assert!(!document.get_bool("is_published").unwrap());
        assert!(!document.contains_key("branch_code"));
    }

    #[test]
    fn franchise_wide_course_marks_branch_null() {
        let mut request = course();
        request.branch_only = false;
        let document = request.into_document();
        assert_eq!(document.get("branch_code"), Some(&Bson::Null));
    }

    #[test]
    fn course_validation_reports_level_and_price() {
        let mut request = course();
        request.level = Some("expert".into());
        request.price = -5.0;
        let body = request.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["level"].is_string());
        assert!(body["field_errors"]["price"].is_string());
    }

    #[test]
    fn lesson_carries_parent_ids() {
        let request = CreateLessonRequest {
            title: "Borrowing".into(),
            content: None,
            video_url: Some("https://cdn.example/v/1.mp4".into()),
            duration_minutes: Some(12),
            order: 2,
        };
        request.validate().unwrap();
        let document = request.into_document("m1", "c1");
        assert_eq!(document.get_str("module_id").unwrap(), "m1");
        assert_eq!(document.get_str("course_id").unwrap(), "c1");
        assert_eq!(document.get_i32("order").unwrap(), 2);
    }

    #[test]
    fn lesson_rejects_bad_url_and_duration() {
        let request = UpdateLessonRequest {
            video_url: Some("not a url".into()),
            duration_minutes: Some(5000),
            ..Default::default()
        };
        let body = request.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["video_url"].is_string());
        assert!(body["field_errors"]["duration_minutes"].is_string());
    }

    #[test]
    fn uploaded_paths_are_accepted_as_video_urls() {
        let request = UpdateLectureRequest {
            video_url: Some("/uploads/videos/abc.mp4".into()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.to_set_document().len(), 1);
    }
}
