pub mod access;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod types;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{elevated, protected, public};
use crate::middleware::{elevated_role_middleware, jwt_auth_middleware};

/// Full application router: public, protected and elevated tiers plus the
/// static upload directory.
pub fn app() -> Router {
    let config = config::config();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(protected_routes())
        .merge(elevated_routes())
        .nest_service("/uploads", ServeDir::new(&config.uploads.dir))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer())
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
        );

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

fn public_routes() -> Router {
    Router::new()
        .route("/auth/register", post(public::register_post))
        .route("/auth/login", post(public::login_post))
        .route("/auth/refresh", post(public::refresh_post))
        .route("/connect", post(public::connect_post))
}

fn protected_routes() -> Router {
    use protected as p;

    let upload_limit = config::config().uploads.max_file_size_bytes + 64 * 1024;

    Router::new()
        // Own account
        .route("/api/auth/me", get(p::me_get))
        .route("/api/auth/password", put(p::password_put))
        // Users
        .route("/api/users", get(p::users_list).post(p::users_create))
        .route("/api/users/:id", get(p::user_get).put(p::user_update).delete(p::user_delete))
        // Courses and their content
        .route("/api/courses", get(p::courses_list).post(p::courses_create))
        .route("/api/courses/:id", get(p::course_get).put(p::course_update).delete(p::course_delete))
        .route("/api/courses/:id/publish", post(p::course_publish))
        .route("/api/courses/:id/modules", get(p::modules_list).post(p::modules_create))
        .route("/api/modules/:id", put(p::module_update).delete(p::module_delete))
        .route("/api/modules/:id/lessons", get(p::lessons_list).post(p::lessons_create))
        .route("/api/lessons/:id", put(p::lesson_update).delete(p::lesson_delete))
        .route("/api/courses/:id/lectures", get(p::lectures_list).post(p::lectures_create))
        .route("/api/lectures/:id", get(p::lecture_get).put(p::lecture_update).delete(p::lecture_delete))
        .route("/api/courses/:id/quizzes", get(p::quizzes_list).post(p::quizzes_create))
        .route("/api/quizzes/:id", get(p::quiz_get).put(p::quiz_update).delete(p::quiz_delete))
        .route("/api/quizzes/:id/attempts", get(p::attempts_list).post(p::attempts_create))
        // Enrollments
        .route("/api/enrollments", get(p::enrollments_list).post(p::enrollments_create))
        .route("/api/enrollments/:id", get(p::enrollment_get))
        .route("/api/enrollments/:id/progress", post(p::enrollment_progress))
        .route("/api/enrollments/:id/cancel", post(p::enrollment_cancel))
        // Notifications
        .route("/api/notifications", get(p::notifications_list).post(p::notifications_create))
        .route("/api/notifications/:id", axum::routing::delete(p::notification_delete))
        .route("/api/notifications/:id/read", post(p::notification_read))
        // Support
        .route("/api/support/tickets", get(p::tickets_list).post(p::tickets_create))
        .route("/api/support/tickets/:id", get(p::ticket_get))
        .route("/api/support/tickets/:id/replies", post(p::ticket_reply))
        .route("/api/support/tickets/:id/status", put(p::ticket_status_put))
        // Uploads
        .route("/api/uploads", get(p::uploads_list))
        .route(
            "/api/uploads/:category",
            post(p::upload_post).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(from_fn(jwt_auth_middleware))
}

fn elevated_routes() -> Router {
    use elevated as e;

    Router::new()
        .route("/api/admin/franchises", get(e::franchises_list).post(e::franchises_create))
        .route("/api/admin/franchises/:code", get(e::franchise_get).put(e::franchise_update))
        .route("/api/admin/franchises/:code/status", post(e::franchise_status_post))
        .route("/api/admin/franchises/:code/branches", get(e::branches_list).post(e::branches_create))
        .route("/api/admin/branches/:id", put(e::branch_update).delete(e::branch_delete))
        .route("/api/admin/franchises/:code/agreements", get(e::agreements_list).post(e::agreements_create))
        .route("/api/admin/agreements/:id", put(e::agreement_update))
        .route("/api/admin/enquiries", get(e::enquiries_list))
        .route("/api/admin/enquiries/:id/status", put(e::enquiry_status_put))
        // Layers run bottom-up: the JWT is checked before the role
        .route_layer(from_fn(elevated_role_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "message": "LMS API",
        "data": {
            "name": "LMS API (Rust)",
            "version": version,
            "description": "Multi-tenant learning management backend with franchise/branch access control",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/login, /auth/refresh (public - token acquisition)",
                "connect": "/connect (public)",
                "me": "/api/auth/me, /api/auth/password (protected)",
                "users": "/api/users[/:id] (protected)",
                "courses": "/api/courses[/:id] with modules, lectures and quizzes (protected)",
                "lessons": "/api/modules/:id/lessons, /api/lessons/:id (protected)",
                "enrollments": "/api/enrollments[/:id] (protected)",
                "notifications": "/api/notifications (protected)",
                "support": "/api/support/tickets (protected)",
                "uploads": "/api/uploads/:category (protected), /uploads/* (static)",
                "admin": "/api/admin/* (franchise management roles)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match database::DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Service healthy",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Database unavailable",
                    "error": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}

async fn not_found() -> error::ApiError {
    error::ApiError::not_found("Route not found")
}
