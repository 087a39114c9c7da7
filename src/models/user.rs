use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::validation::{normalize_email, FieldErrors};
use super::franchise::normalize_code;
use crate::access::Role;
use crate::auth::{validate_password_strength, Claims};
use crate::error::ApiError;

/// Stored user as loaded by the auth layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    #[serde(default)]
    pub franchise_code: Option<String>,
    #[serde(default)]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_login_at: Option<DateTime>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn from_document(document: Document) -> Result<Self, ApiError> {
        mongodb::bson::from_document(document).map_err(|e| {
            tracing::error!("Stored user document is malformed: {}", e);
            ApiError::internal_server_error("Stored user record is malformed")
        })
    }

    pub fn role(&self) -> Result<Role, ApiError> {
        self.role.parse::<Role>().map_err(ApiError::from)
    }

    pub fn claims(&self) -> Claims {
        Claims::new(
            self.id.to_hex(),
            self.email.clone(),
            self.role.clone(),
            self.franchise_code.clone(),
            self.branch_code.clone(),
        )
    }

    /// Public view; never includes the password hash
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id.to_hex(),
            "name": self.name,
            "email": self.email,
            "role": self.role,
            "franchise_code": self.franchise_code,
            "branch_code": self.branch_code,
            "phone": self.phone,
            "is_active": self.is_active,
        })
    }
}

/// Strip secrets from a raw user document before it is returned
pub fn public_user(mut document: Document) -> Document {
    document.remove("password_hash");
    document
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub franchise_code: Option<String>,
    pub branch_code: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, 2, 100);
        errors.email("email", &self.email);
        if let Err(msg) = validate_password_strength(&self.password) {
            errors.add("password", msg);
        }
        errors.optional_text("phone", self.phone.as_deref(), 20);
        if self.branch_code.is_some() && self.franchise_code.is_none() {
            errors.add("branch_code", "A branch requires a franchise_code");
        }
        errors.finish()
    }

    pub fn into_document(self, password_hash: String) -> Document {
        let mut document = doc! {
            "name": self.name.trim(),
            "email": normalize_email(&self.email),
            "password_hash": password_hash,
            "role": Role::Student.as_str(),
            "is_active": true,
        };
        if let Some(phone) = self.phone {
            document.insert("phone", phone);
        }
        if let Some(code) = self.franchise_code {
            document.insert("franchise_code", normalize_code(&code));
        }
        if let Some(code) = self.branch_code {
            document.insert("branch_code", normalize_code(&code));
        }
        document
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.email("email", &self.email);
        if self.password.is_empty() {
            errors.add("password", "This field is required");
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.current_password.is_empty() {
            errors.add("current_password", "This field is required");
        }
        if let Err(msg) = validate_password_strength(&self.new_password) {
            errors.add("new_password", msg);
        } else if self.new_password == self.current_password {
            errors.add("new_password", "New password must differ from the current one");
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub franchise_code: Option<String>,
    pub branch_code: Option<String>,
}

impl CreateUserRequest {
    /// Validates fields and returns the parsed role
    pub fn validate(&self) -> Result<Role, ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, 2, 100);
        errors.email("email", &self.email);
        if let Err(msg) = validate_password_strength(&self.password) {
            errors.add("password", msg);
        }
        errors.optional_text("phone", self.phone.as_deref(), 20);
        let role = self.role.parse::<Role>();
        if role.is_err() {
            errors.add("role", format!("Unknown role '{}'", self.role));
        }
        errors.finish()?;
        role.map_err(ApiError::from)
    }

    pub fn into_document(self, role: Role, password_hash: String) -> Document {
        let mut document = doc! {
            "name": self.name.trim(),
            "email": normalize_email(&self.email),
            "password_hash": password_hash,
            "role": role.as_str(),
            "is_active": true,
        };
        if let Some(phone) = self.phone {
            document.insert("phone", phone);
        }
        if let Some(code) = self.franchise_code {
            document.insert("franchise_code", normalize_code(&code));
        }
        if let Some(code) = self.branch_code {
            document.insert("branch_code", normalize_code(&code));
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub branch_code: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<Option<Role>, ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.text("name", name, 2, 100);
        }
        errors.optional_text("phone", self.phone.as_deref(), 20);
        let role = match &self.role {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    errors.add("role", format!("Unknown role '{}'", raw));
                    None
                }
            },
            None => None,
        };
        errors.finish()?;
        Ok(role)
    }

    pub fn to_set_document(&self, role: Option<Role>) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.trim());
        }
        if let Some(phone) = &self.phone {
            set.insert("phone", phone.clone());
        }
        if let Some(role) = role {
            set.insert("role", role.as_str());
        }
        if let Some(code) = &self.branch_code {
            set.insert("branch_code", normalize_code(code));
        }
        if let Some(active) = self.is_active {
            set.insert("is_active", active);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".into(),
            email: " Ada@Example.com ".into(),
            password: password.into(),
            phone: None,
            franchise_code: Some("north-01".into()),
            branch_code: None,
        }
    }

    #[test]
    fn register_builds_student_document() {
        let request = register("s3cretpass");
        request.validate().unwrap();
        let document = request.into_document("hash".into());
        assert_eq!(document.get_str("email").unwrap(), "ada@example.com");
        assert_eq!(document.get_str("role").unwrap(), "student");
        assert_eq!(document.get_str("franchise_code").unwrap(), "NORTH-01");
        assert!(document.get_bool("is_active").unwrap());
    }

    #[test]
    fn register_rejects_weak_password() {
        let err = register("short").validate().unwrap_err();
        assert!(err.to_json()["field_errors"]["password"].is_string());
    }

    #[test]
    fn create_user_parses_role_aliases() {
        let request = CreateUserRequest {
            name: "Tess".into(),
            email: "tess@example.com".into(),
            password: "teaching1".into(),
            role: "Teacher".into(),
            phone: None,
            franchise_code: None,
            branch_code: None,
        };
        assert_eq!(request.validate().unwrap(), Role::Instructor);
    }

    #[test]
    fn create_user_rejects_unknown_role() {
        let request = CreateUserRequest {
            name: "Tess".into(),
            email: "tess@example.com".into(),
            password: "teaching1".into(),
            role: "janitor".into(),
            phone: None,
            franchise_code: None,
            branch_code: None,
        };
        let err = request.validate().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn update_only_sets_supplied_fields() {
        let request = UpdateUserRequest {
            name: Some("  New Name ".into()),
            is_active: Some(false),
            ..Default::default()
        };
        let role = request.validate().unwrap();
        let set = request.to_set_document(role);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("name").unwrap(), "New Name");
    }

    #[test]
    fn stored_user_round_trip_hides_hash() {
        let id = ObjectId::new();
        let user = User::from_document(doc! {
            "_id": id,
            "name": "Ada",
            "email": "ada@example.com",
            "password_hash": "$2b$...",
            "role": "franchise_owner",
        })
        .unwrap();
        assert!(user.is_active);
        assert_eq!(user.role().unwrap(), Role::FranchiseAdmin);
        assert!(user.to_json().get("password_hash").is_none());

        let raw = public_user(doc! { "_id": id, "password_hash": "x" });
        assert!(!raw.contains_key("password_hash"));
    }

    #[test]
    fn password_change_must_differ() {
        let request = ChangePasswordRequest {
            current_password: "abcdefg1".into(),
            new_password: "abcdefg1".into(),
        };
        assert!(request.validate().is_err());
    }
}
