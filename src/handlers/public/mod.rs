// handlers/public/mod.rs - Public handlers (no authentication)
//
// Token acquisition and the public contact form. No trusted user context
// exists here, so every input is validated before touching the database.

pub mod auth; // POST /auth/register, /auth/login, /auth/refresh
pub mod connect; // POST /connect

pub use auth::{login_post, refresh_post, register_post};
pub use connect::connect_post;
