pub mod collections;
pub mod manager;
pub mod repository;
pub mod serialize;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::Repository;
pub use serialize::{document_to_json, parse_object_id};
