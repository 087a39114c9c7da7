use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use super::franchise::normalize_code;
use super::validation::{normalize_email, FieldErrors};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryType {
    #[default]
    General,
    Franchise,
    Course,
}

impl EnquiryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnquiryType::General => "general",
            EnquiryType::Franchise => "franchise",
            EnquiryType::Course => "course",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryStatus {
    New,
    Contacted,
    Closed,
}

impl EnquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnquiryStatus::New => "new",
            EnquiryStatus::Contacted => "contacted",
            EnquiryStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(EnquiryStatus::New),
            "contacted" => Some(EnquiryStatus::Contacted),
            "closed" => Some(EnquiryStatus::Closed),
            _ => None,
        }
    }
}

/// Public "connect with us" form
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    #[serde(default)]
    pub enquiry_type: EnquiryType,
    pub franchise_code: Option<String>,
}

impl ConnectRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, 2, 100);
        errors.email("email", &self.email);
        errors.optional_text("phone", self.phone.as_deref(), 20);
        errors.text("message", &self.message, 10, 5_000);
        errors.finish()
    }

    pub fn into_document(self) -> Document {
        let mut document = doc! {
            "name": self.name.trim(),
            "email": normalize_email(&self.email),
            "message": self.message.trim(),
            "enquiry_type": self.enquiry_type.as_str(),
            "status": EnquiryStatus::New.as_str(),
        };
        if let Some(phone) = self.phone {
            document.insert("phone", phone);
        }
        if let Some(code) = self.franchise_code {
            document.insert("franchise_code", normalize_code(&code));
        }
        document
    }
}

#[derive(Debug, Deserialize)]
pub struct EnquiryStatusRequest {
    pub status: EnquiryStatus,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_defaults_to_general_enquiry() {
        let request: ConnectRequest = serde_json::from_value(serde_json::json!({
            "name": "Grace",
            "email": "Grace@Example.org",
            "message": "I would like to open a centre in my town",
        }))
        .unwrap();
        request.validate().unwrap();
        let document = request.into_document();
        assert_eq!(document.get_str("enquiry_type").unwrap(), "general");
        assert_eq!(document.get_str("status").unwrap(), "new");
        assert_eq!(document.get_str("email").unwrap(), "grace@example.org");
    }

    #[test]
    fn connect_validation() {
        let request = ConnectRequest {
            name: "G".into(),
            email: "nope".into(),
            phone: None,
            message: "short".into(),
            enquiry_type: EnquiryType::Franchise,
            franchise_code: None,
        };
        let body = request.validate().unwrap_err().to_json();
        for field in ["name", "email", "message"] {
            assert!(body["field_errors"][field].is_string(), "{field}");
        }
    }

    #[test]
    fn status_parsing() {
        assert_eq!(EnquiryStatus::parse("contacted"), Some(EnquiryStatus::Contacted));
        assert_eq!(EnquiryStatus::parse("archived"), None);
    }
}
