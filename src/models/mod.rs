//! Request payloads, stored-document helpers and the domain rules that do not
//! need the database (grading, progress, ticket transitions).

pub mod course;
pub mod enquiry;
pub mod enrollment;
pub mod franchise;
pub mod notification;
pub mod quiz;
pub mod support;
pub mod user;
pub mod validation;

pub use user::User;
pub use validation::FieldErrors;
