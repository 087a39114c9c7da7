pub mod course_service;
pub mod enrollment_service;
pub mod franchise_service;
pub mod upload_service;

pub use course_service::CourseService;
pub use enrollment_service::EnrollmentService;
pub use franchise_service::FranchiseService;
pub use upload_service::{UploadError, UploadService};
