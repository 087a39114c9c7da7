// handlers/elevated/mod.rs - Elevated handlers (franchise management roles)
//
// Administrative endpoints for the franchise hierarchy: franchises, their
// branches and agreements, and enquiries from the public connect form.
//
// Security Level: JWT + super_admin, admin, franchise_admin or branch_admin
// Route Prefix: /api/admin/*
// Middleware: JWT validation, then elevated_role_middleware

pub mod agreements; // Franchise agreements
pub mod branches; // Branches within a franchise
pub mod enquiries; // Connect enquiries follow-up
pub mod franchises; // Franchise registry and status

pub use agreements::*;
pub use branches::*;
pub use enquiries::*;
pub use franchises::*;

/*
ELEVATED HANDLER ARCHITECTURE:

Middleware Stack Applied to All Elevated Routes:
```rust
Router::new()
    .route("/api/admin/franchises", get(elevated::franchises_list))
    .layer(axum::middleware::from_fn(elevated_role_middleware)) // Loads CurrentUser, checks role
    .layer(axum::middleware::from_fn(jwt_auth_middleware))      // Base JWT validation
```

Layers run bottom-up: the last one added wraps the others, so the JWT is
decoded before the role check and the CurrentUser inserted by
elevated_role_middleware is reused by handlers.

Scope Rules:
- **Global roles**: every franchise; only they create franchises or change
  franchise status
- **Franchise admins**: their own franchise, its branches and enquiries;
  agreements read-only
- **Branch admins**: read their franchise, manage their own branch record,
  follow up their franchise's enquiries
*/
