// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every endpoint here runs behind jwt_auth_middleware and receives a
// CurrentUser: the active stored user plus a BranchAccessManager built from
// their role and franchise/branch codes.
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: JWT validation, then user loading through the CurrentUser extractor

pub mod courses; // Course catalogue and publication
pub mod enrollments; // Enrollment and lesson progress
pub mod lectures; // Course lectures
pub mod me; // Own profile and password
pub mod modules; // Course modules and lessons
pub mod notifications; // Notification feed
pub mod quizzes; // Quizzes, attempts and grading
pub mod support; // Support tickets
pub mod uploads; // Multipart file uploads
pub mod users; // User administration

pub use courses::*;
pub use enrollments::*;
pub use lectures::*;
pub use me::*;
pub use modules::*;
pub use notifications::*;
pub use quizzes::*;
pub use support::*;
pub use uploads::*;
pub use users::*;

/*
PROTECTED HANDLER ARCHITECTURE:

Middleware Stack Applied to All Protected Routes:
```rust
Router::new()
    .route("/api/auth/me", get(protected::me_get))
    .route("/api/courses", get(protected::courses_list).post(protected::courses_create))
    .layer(axum::middleware::from_fn(jwt_auth_middleware))
```

Handler Context:
- **AuthUser**: decoded claims, inserted by the JWT middleware
- **CurrentUser**: the stored user, re-checked for activity and franchise status
- **BranchAccessManager**: role/operation matrix plus tenant filters

Tenancy Model:
- Reads AND the access manager's filter into every query, so records outside
  the caller's franchise or branch answer 404 rather than 403
- Writes copy the caller's franchise/branch codes onto new documents
- Course content (modules, lessons, lectures, quizzes) has no codes of its own
  and is checked through its parent course
*/
