pub mod auth;
pub mod current_user;
pub mod extract;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use current_user::{elevated_role_middleware, forget_user, get_current_user, require_roles, CurrentUser};
pub use extract::{JsonBody, MultipartForm, PathParam, QueryParams};
pub use response::{ApiResponse, ApiResult};
