use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use super::validation::FieldErrors;
use crate::access::Role;
use crate::database::serialize::now;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    /// Closed tickets are terminal
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        match self {
            Open => matches!(next, InProgress | Resolved | Closed),
            InProgress => matches!(next, Resolved | Closed | Open),
            Resolved => matches!(next, Closed | Open),
            Closed => false,
        }
    }
}

/// Check a status change requested by `role`. Students may only close
/// tickets; ownership is enforced by the tenant filter.
pub fn check_transition(role: Role, current: TicketStatus, next: TicketStatus) -> Result<(), ApiError> {
    if role == Role::Student && next != TicketStatus::Closed {
        return Err(ApiError::forbidden("Students may only close their own tickets"));
    }
    if !current.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "Cannot change ticket status from '{}' to '{}'",
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

/// Fields written with a status change; resolution and closing are timestamped
pub fn status_change_set(next: TicketStatus) -> Document {
    let mut set = doc! { "status": next.as_str() };
    match next {
        TicketStatus::Resolved => {
            set.insert("resolved_at", now());
        }
        TicketStatus::Closed => {
            set.insert("closed_at", now());
        }
        _ => {}
    }
    set
}

/// Status a ticket moves to when `replier` answers it. Staff picking up an
/// open ticket start working on it; closed tickets take no replies.
pub fn status_after_reply(current: TicketStatus, replier: Role) -> Result<Option<TicketStatus>, ApiError> {
    match current {
        TicketStatus::Closed => Err(ApiError::bad_request("Closed tickets cannot receive replies")),
        TicketStatus::Open if replier != Role::Student => Ok(Some(TicketStatus::InProgress)),
        _ => Ok(None),
    }
}

/// `TKT-YYYYMMDD-XXXXXX` with a random uppercase suffix
pub fn ticket_number(at: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("TKT-{}-{}", at.format("%Y%m%d"), suffix)
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub priority: Option<TicketPriority>,
}

impl CreateTicketRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("subject", &self.subject, 3, 200);
        errors.text("description", &self.description, 10, 10_000);
        errors.finish()
    }

    pub fn into_document(self, created_by: ObjectId) -> Document {
        doc! {
            "ticket_number": ticket_number(Utc::now()),
            "subject": self.subject.trim(),
            "description": self.description,
            "priority": self.priority.unwrap_or(TicketPriority::Medium).as_str(),
            "status": TicketStatus::Open.as_str(),
            "created_by": created_by.to_hex(),
            "replies": Bson::Array(vec![]),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

impl ReplyRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("message", &self.message, 1, 10_000);
        errors.finish()
    }

    pub fn into_reply(self, author_id: ObjectId, author_role: Role) -> Document {
        doc! {
            "author_id": author_id.to_hex(),
            "author_role": author_role.as_str(),
            "message": self.message.trim(),
            "created_at": now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transition_table() {
        use TicketStatus::*;
        assert!(Open.can_transition_to(InProgress));
        assert!(Open.can_transition_to(Closed));
        assert!(!Open.can_transition_to(Open));
        assert!(InProgress.can_transition_to(Open));
        assert!(Resolved.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(InProgress));
        for next in [Open, InProgress, Resolved, Closed] {
            assert!(!Closed.can_transition_to(next));
        }
    }

    #[test]
    fn students_may_only_close() {
        assert!(check_transition(Role::Student, TicketStatus::Open, TicketStatus::Closed).is_ok());
        let err = check_transition(Role::Student, TicketStatus::Open, TicketStatus::Resolved).unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = check_transition(Role::Instructor, TicketStatus::Closed, TicketStatus::Open).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn status_changes_are_timestamped() {
        let resolved = status_change_set(TicketStatus::Resolved);
        assert_eq!(resolved.get_str("status").unwrap(), "resolved");
        assert!(resolved.get_datetime("resolved_at").is_ok());
        assert!(!resolved.contains_key("closed_at"));

        let closed = status_change_set(TicketStatus::Closed);
        assert!(closed.get_datetime("closed_at").is_ok());

        let reopened = status_change_set(TicketStatus::Open);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn staff_replies_pick_up_open_tickets() {
        use TicketStatus::*;
        assert_eq!(status_after_reply(Open, Role::Instructor).unwrap(), Some(InProgress));
        assert_eq!(status_after_reply(Open, Role::Student).unwrap(), None);
        assert_eq!(status_after_reply(Resolved, Role::BranchAdmin).unwrap(), None);
        assert_eq!(status_after_reply(InProgress, Role::Student).unwrap(), None);

        let err = status_after_reply(Closed, Role::Admin).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn students_can_close_from_any_open_state() {
        use TicketStatus::*;
        for current in [Open, InProgress, Resolved] {
            assert!(check_transition(Role::Student, current, Closed).is_ok());
        }
        assert_eq!(check_transition(Role::Student, Closed, Closed).unwrap_err().status_code(), 400);
    }

    #[test]
    fn ticket_number_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let number = ticket_number(at);
        assert!(number.starts_with("TKT-20240309-"));
        let suffix = &number["TKT-20240309-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn new_ticket_is_open_with_default_priority() {
        let request = CreateTicketRequest {
            subject: "Cannot log in".into(),
            description: "Password reset link never arrives".into(),
            priority: None,
        };
        request.validate().unwrap();
        let document = request.into_document(ObjectId::new());
        assert_eq!(document.get_str("status").unwrap(), "open");
        assert_eq!(document.get_str("priority").unwrap(), "medium");
        assert!(document.get_array("replies").unwrap().is_empty());
    }

    #[test]
    fn status_request_parses_snake_case() {
        let parsed: TicketStatusRequest =
            serde_json::from_value(serde_json::json!({"status": "in_progress"})).unwrap();
        assert_eq!(parsed.status, TicketStatus::InProgress);
        assert_eq!(TicketStatus::parse("resolved"), Some(TicketStatus::Resolved));
    }
}
