use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use super::franchise::normalize_code;
use super::validation::FieldErrors;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    All,
    Franchise,
    Branch,
    User,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Franchise => "franchise",
            Audience::Branch => "branch",
            Audience::User => "user",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub title: String,
    pub message: String,
    pub audience: Audience,
    pub target_user_id: Option<String>,
    pub franchise_code: Option<String>,
    pub branch_code: Option<String>,
}

impl CreateNotificationRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 2, 200);
        errors.text("message", &self.message, 1, 5_000);
        match self.audience {
            Audience::User => match &self.target_user_id {
                Some(id) => errors.object_id("target_user_id", id),
                None => errors.add("target_user_id", "Required when audience is 'user'"),
            },
            _ if self.target_user_id.is_some() => {
                errors.add("target_user_id", "Only valid when audience is 'user'")
            }
            _ => {}
        }
        errors.finish()
    }

    /// Tenancy for franchise/branch audiences is stamped afterwards by the
    /// access layer; global senders may name the codes themselves.
    pub fn into_document(self, created_by: ObjectId) -> Document {
        let mut document = doc! {
            "title": self.title.trim(),
            "message": self.message,
            "audience": self.audience.as_str(),
            "read_by": Bson::Array(vec![]),
            "created_by": created_by.to_hex(),
        };
        if let Some(target) = self.target_user_id {
            document.insert("target_user_id", target.trim());
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

/// Replace `read_by` with the caller's `is_read` flag
pub fn with_read_flag(mut notification: Document, user_id: &str) -> Document {
    let is_read = notification
        .get_array("read_by")
        .map(|readers| readers.iter().any(|r| r.as_str() == Some(user_id)))
        .unwrap_or(false);
    notification.remove("read_by");
    notification.insert("is_read", is_read);
    notification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_audience_needs_target() {
        let request = CreateNotificationRequest {
            title: "Exam".into(),
            message: "Tomorrow at nine".into(),
            audience: Audience::User,
            target_user_id: None,
            franchise_code: None,
            branch_code: None,
        };
        let body = request.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["target_user_id"].is_string());
    }

    #[test]
    fn broadcast_rejects_target() {
        let request = CreateNotificationRequest {
            title: "Holiday".into(),
            message: "Closed Monday".into(),
            audience: Audience::All,
            target_user_id: Some(ObjectId::new().to_hex()),
            franchise_code: None,
            branch_code: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn new_notifications_start_unread() {
        let author = ObjectId::new();
        let request = CreateNotificationRequest {
            title: "Holiday".into(),
            message: "Closed Monday".into(),
            audience: Audience::Franchise,
            target_user_id: None,
            franchise_code: Some("north".into()),
            branch_code: None,
        };
        let document = request.into_document(author);
        assert!(document.get_array("read_by").unwrap().is_empty());
        assert_eq!(document.get_str("created_by").unwrap(), author.to_hex());
        assert_eq!(document.get_str("franchise_code").unwrap(), "NORTH");
    }

    #[test]
    fn read_flag_reflects_caller() {
        let notification = doc! { "title": "t", "read_by": ["a", "b"] };
        let flagged = with_read_flag(notification.clone(), "b");
        assert!(flagged.get_bool("is_read").unwrap());
        assert!(!flagged.contains_key("read_by"));
        assert!(!with_read_flag(notification, "c").get_bool("is_read").unwrap());
    }
}
