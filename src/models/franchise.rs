use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use super::validation::{normalize_email, FieldErrors};
use crate::database::serialize::to_bson_datetime;
use crate::error::ApiError;

pub const CODE_MIN_LEN: usize = 3;
pub const CODE_MAX_LEN: usize = 20;

/// Uppercase, trimmed form used for every stored franchise/branch code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn validate_code(code: &str) -> Result<(), String> {
    let code = normalize_code(code);
    if code.len() < CODE_MIN_LEN || code.len() > CODE_MAX_LEN {
        return Err(format!(
            "Code must be between {} and {} characters",
            CODE_MIN_LEN, CODE_MAX_LEN
        ));
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-') {
        return Err("Code may only contain letters, digits and '-'".to_string());
    }
    if code.starts_with('-') || code.ends_with('-') {
        return Err("Code cannot start or end with '-'".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FranchiseStatus {
    Active,
    Suspended,
    Inactive,
}

impl FranchiseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FranchiseStatus::Active => "active",
            FranchiseStatus::Suspended => "suspended",
            FranchiseStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(FranchiseStatus::Active),
            "suspended" => Some(FranchiseStatus::Suspended),
            "inactive" => Some(FranchiseStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFranchiseRequest {
    pub name: String,
    pub franchise_code: String,
    pub owner_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl CreateFranchiseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, 2, 150);
        if let Err(msg) = validate_code(&self.franchise_code) {
            errors.add("franchise_code", msg);
        }
        errors.text("owner_name", &self.owner_name, 2, 100);
        errors.email("email", &self.email);
        errors.optional_text("phone", self.phone.as_deref(), 20);
        errors.optional_text("address", self.address.as_deref(), 500);
        errors.finish()
    }

    pub fn into_document(self) -> Document {
        let mut document = doc! {
            "name": self.name.trim(),
            "franchise_code": normalize_code(&self.franchise_code),
            "owner_name": self.owner_name.trim(),
            "email": normalize_email(&self.email),
            "status": FranchiseStatus::Active.as_str(),
        };
        if let Some(phone) = self.phone {
            document.insert("phone", phone);
        }
        if let Some(address) = self.address {
            document.insert("address", address);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFranchiseRequest {
    pub name: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl UpdateFranchiseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.text("name", name, 2, 150);
        }
        if let Some(owner) = &self.owner_name {
            errors.text("owner_name", owner, 2, 100);
        }
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        errors.optional_text("phone", self.phone.as_deref(), 20);
        errors.optional_text("address", self.address.as_deref(), 500);
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.trim());
        }
        if let Some(owner) = &self.owner_name {
            set.insert("owner_name", owner.trim());
        }
        if let Some(email) = &self.email {
            set.insert("email", normalize_email(email));
        }
        if let Some(phone) = &self.phone {
            set.insert("phone", phone.clone());
        }
        if let Some(address) = &self.address {
            set.insert("address", address.clone());
        }
        set
    }
}

#[derive(Debug, Deserialize)]
pub struct FranchiseStatusRequest {
    pub status: FranchiseStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    pub branch_code: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl CreateBranchRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("name", &self.name, 2, 150);
        if let Err(msg) = validate_code(&self.branch_code) {
            errors.add("branch_code", msg);
        }
        errors.optional_text("address", self.address.as_deref(), 500);
        errors.optional_text("phone", self.phone.as_deref(), 20);
        errors.finish()
    }

    pub fn into_document(self, franchise_code: &str) -> Document {
        let mut document = doc! {
            "franchise_code": franchise_code,
            "branch_code": normalize_code(&self.branch_code),
            "name": self.name.trim(),
            "status": FranchiseStatus::Active.as_str(),
        };
        if let Some(address) = self.address {
            document.insert("address", address);
        }
        if let Some(phone) = self.phone {
            document.insert("phone", phone);
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub status: Option<FranchiseStatus>,
}

impl UpdateBranchRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.text("name", name, 2, 150);
        }
        errors.optional_text("address", self.address.as_deref(), 500);
        errors.optional_text("phone", self.phone.as_deref(), 20);
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.trim());
        }
        if let Some(address) = &self.address {
            set.insert("address", address.clone());
        }
        if let Some(phone) = &self.phone {
            set.insert("phone", phone.clone());
        }
        if let Some(status) = self.status {
            set.insert("status", status.as_str());
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    Active,
    Expired,
    Terminated,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Draft => "draft",
            AgreementStatus::Active => "active",
            AgreementStatus::Expired => "expired",
            AgreementStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAgreementRequest {
    pub title: String,
    pub terms: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
    pub royalty_percent: f64,
    pub status: Option<AgreementStatus>,
}

impl CreateAgreementRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 3, 200);
        errors.text("terms", &self.terms, 10, 20_000);
        errors.range("royalty_percent", self.royalty_percent, 0.0, 100.0);
        if self.end_date <= self.start_date {
            errors.add("end_date", "End date must be after the start date");
        }
        errors.finish()
    }

    pub fn into_document(self, franchise_code: &str) -> Document {
        let status = self.status.unwrap_or(AgreementStatus::Draft);
        let mut document = doc! {
            "franchise_code": franchise_code,
            "title": self.title.trim(),
            "terms": self.terms,
            "start_date": to_bson_datetime(self.start_date),
            "end_date": to_bson_datetime(self.end_date),
            "royalty_percent": self.royalty_percent,
            "status": status.as_str(),
        };
        if status == AgreementStatus::Active {
            document.insert("signed_at", crate::database::serialize::now());
        }
        document
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgreementRequest {
    pub title: Option<String>,
    pub terms: Option<String>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub royalty_percent: Option<f64>,
    pub status: Option<AgreementStatus>,
}

impl UpdateAgreementRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 3, 200);
        }
        if let Some(terms) = &self.terms {
            errors.text("terms", terms, 10, 20_000);
        }
        if let Some(royalty) = self.royalty_percent {
            errors.range("royalty_percent", royalty, 0.0, 100.0);
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(terms) = &self.terms {
            set.insert("terms", terms.clone());
        }
        if let Some(end) = self.end_date {
            set.insert("end_date", to_bson_datetime(end));
        }
        if let Some(royalty) = self.royalty_percent {
            set.insert("royalty_percent", royalty);
        }
        if let Some(status) = self.status {
            set.insert("status", status.as_str());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalised_and_checked() {
        assert_eq!(normalize_code("  north-01 "), "NORTH-01");
        assert!(validate_code("north-01").is_ok());
        assert!(validate_code("ab").is_err());
        assert!(validate_code("has space").is_err());
        assert!(validate_code("-LEAD").is_err());
        assert!(validate_code(&"X".repeat(21)).is_err());
    }

    #[test]
    fn new_franchise_starts_active() {
        let request = CreateFranchiseRequest {
            name: "North Learning".into(),
            franchise_code: "north".into(),
            owner_name: "Olu".into(),
            email: "OWNER@north.example".into(),
            phone: None,
            address: None,
        };
        request.validate().unwrap();
        let document = request.into_document();
        assert_eq!(document.get_str("franchise_code").unwrap(), "NORTH");
        assert_eq!(document.get_str("status").unwrap(), "active");
        assert_eq!(document.get_str("email").unwrap(), "owner@north.example");
    }

    #[test]
    fn status_parses_from_json() {
        let parsed: FranchiseStatusRequest =
            serde_json::from_value(serde_json::json!({"status": "suspended"})).unwrap();
        assert_eq!(parsed.status, FranchiseStatus::Suspended);
        assert!(serde_json::from_value::<FranchiseStatusRequest>(serde_json::json!({"status": "gone"})).is_err());
        assert_eq!(FranchiseStatus::parse("inactive"), Some(FranchiseStatus::Inactive));
        assert_eq!(FranchiseStatus::parse("ACTIVE"), None);
    }

    #[test]
    fn agreement_dates_must_be_ordered() {
        let start = chrono::Utc::now();
        let request = CreateAgreementRequest {
            title: "Master franchise".into(),
            terms: "Ten percent royalty on tuition".into(),
            start_date: start,
            end_date: start - chrono::Duration::days(1),
            royalty_percent: 10.0,
            status: None,
        };
        let err = request.validate().unwrap_err();
        assert!(err.to_json()["field_errors"]["end_date"].is_string());
    }

    #[test]
    fn active_agreement_is_signed() {
        let start = chrono::Utc::now();
        let request = CreateAgreementRequest {
            title: "Master franchise".into(),
            terms: "Ten percent royalty on tuition".into(),
            start_date: start,
            end_date: start + chrono::Duration::days(365),
            royalty_percent: 10.0,
            status: Some(AgreementStatus::Active),
        };
        let document = request.into_document("NORTH");
        assert!(document.get_datetime("signed_at").is_ok());
        assert_eq!(document.get_str("status").unwrap(), "active");
    }
}
