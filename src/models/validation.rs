use std::collections::HashMap;

use crate::error::ApiError;

/// Collects per-field validation failures into a single 400 response.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: HashMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        // First failure per field wins
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.add(field, "This field is required");
        } else if len < min {
            self.add(field, format!("Must be at least {} characters", min));
        } else if len > max {
            self.add(field, format!("Must be at most {} characters", max));
        }
    }

    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.add(field, format!("Must be at most {} characters", max));
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if let Err(msg) = validate_email_format(value) {
            self.add(field, msg);
        }
    }

    pub fn object_id(&mut self, field: &str, value: &str) {
        if mongodb::bson::oid::ObjectId::parse_str(value.trim()).is_err() {
            self.add(field, "Must be a valid id");
        }
    }

    pub fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !value.is_finite() || value < min || value > max {
            self.add(field, format!("Must be between {} and {}", min, max));
        }
    }

    /// Validation error naming one offending field
    pub fn single(field: &str, message: impl Into<String>) -> ApiError {
        let mut errors = Self::new();
        errors.add(field, message);
        ApiError::validation_error("Validation failed", Some(errors.errors))
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Validation failed", Some(self.errors)))
        }
    }
}

pub fn validate_email_format(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }
    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
