use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    pub app_name: String,
    pub server_selection_timeout_ms: u64,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_request_size_bytes: usize,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub allow_self_registration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
    pub max_file_size_bytes: usize,
    pub public_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub user_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env::var("LMS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("MONGODB_URI") {
            self.database.uri = v;
        }
        if let Ok(v) = env::var("MONGODB_DATABASE") {
            self.database.name = v;
        }
        if let Ok(v) = env::var("MONGODB_SERVER_SELECTION_TIMEOUT_MS") {
            self.database.server_selection_timeout_ms =
                v.parse().unwrap_or(self.database.server_selection_timeout_ms);
        }
        if let Ok(v) = env::var("MONGODB_MAX_POOL_SIZE") {
            self.database.max_pool_size = v.parse().unwrap_or(self.database.max_pool_size);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_SELF_REGISTRATION") {
            self.security.allow_self_registration =
                v.parse().unwrap_or(self.security.allow_self_registration);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_DIR") {
            self.uploads.dir = v;
        }
        if let Ok(v) = env::var("UPLOAD_MAX_FILE_SIZE_BYTES") {
            self.uploads.max_file_size_bytes = v.parse().unwrap_or(self.uploads.max_file_size_bytes);
        }

        if let Ok(v) = env::var("CACHE_USER_TTL_SECS") {
            self.cache.user_ttl_secs = v.parse().unwrap_or(self.cache.user_ttl_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 8000 },
            database: DatabaseConfig {
                uri: "mongodb://localhost:27017".to_string(),
                name: "lms_dev".to_string(),
                app_name: "lms-api-rust".to_string(),
                server_selection_timeout_ms: 5_000,
                max_pool_size: 10,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 200,
                max_request_size_bytes: 50 * 1024 * 1024, // 50MB, uploads included
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                bcrypt_cost: 10,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                allow_self_registration: true,
            },
            uploads: UploadConfig {
                dir: "uploads".to_string(),
                max_file_size_bytes: 50 * 1024 * 1024,
                public_path: "/uploads".to_string(),
            },
            cache: CacheConfig { user_ttl_secs: 60 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 8000 },
            database: DatabaseConfig {
                uri: "mongodb://localhost:27017".to_string(),
                name: "lms_staging".to_string(),
                app_name: "lms-api-rust".to_string(),
                server_selection_timeout_ms: 10_000,
                max_pool_size: 20,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 100,
                max_request_size_bytes: 25 * 1024 * 1024,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
                cors_origins: vec!["https://staging.example.com".to_string()],
                allow_self_registration: true,
            },
            uploads: UploadConfig {
                dir: "uploads".to_string(),
                max_file_size_bytes: 25 * 1024 * 1024,
                public_path: "/uploads".to_string(),
            },
            cache: CacheConfig { user_ttl_secs: 60 },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 8000 },
            database: DatabaseConfig {
                uri: "mongodb://localhost:27017".to_string(),
                name: "lms".to_string(),
                app_name: "lms-api-rust".to_string(),
                server_selection_timeout_ms: 10_000,
                max_pool_size: 50,
            },
            api: ApiConfig {
                default_page_size: 20,
                max_page_size: 100,
                max_request_size_bytes: 25 * 1024 * 1024,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                // Must come from JWT_SECRET; token operations fail while empty
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                bcrypt_cost: 12,
                cors_origins: vec!["https://app.example.com".to_string()],
                allow_self_registration: false,
            },
            uploads: UploadConfig {
                dir: "uploads".to_string(),
                max_file_size_bytes: 25 * 1024 * 1024,
                public_path: "/uploads".to_string(),
            },
            cache: CacheConfig { user_ttl_secs: 30 },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_config_is_permissive() {
        let config = AppConfig::development();
        assert!(config.security.allow_self_registration);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.api.default_page_size, 20);
        assert_eq!(config.uploads.dir, "uploads");
    }

    #[test]
    fn production_config_requires_explicit_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.security.allow_self_registration);
        assert!(config.api.max_page_size <= 100);
        assert!(config.security.bcrypt_cost >= 12);
    }
}
