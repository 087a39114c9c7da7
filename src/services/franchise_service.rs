use std::time::Duration;

use mongodb::bson::{doc, Document};
use once_cell::sync::Lazy;

use crate::access::{BranchAccessManager, Resource};
use crate::cache::TtlCache;
use crate::config;
use crate::database::{collections, DatabaseError, Repository};
use crate::error::ApiError;
use crate::models::franchise::{normalize_code, FranchiseStatus};

static STATUS_CACHE: Lazy<TtlCache<String, String>> = Lazy::new(|| {
    TtlCache::new(Duration::from_secs(config::config().cache.user_ttl_secs), 1_000)
});

/// Users of a suspended, inactive or missing franchise are locked out
pub fn check_franchise_status(code: &str, status: Option<&str>) -> Result<(), ApiError> {
    match status {
        Some(status) if status == FranchiseStatus::Active.as_str() => Ok(()),
        Some(status) => {
            tracing::warn!("Access blocked for franchise {} ({})", code, status);
            Err(ApiError::forbidden(format!("Franchise is {}", status)))
        }
        None => Err(ApiError::forbidden("Franchise does not exist")),
    }
}

/// Franchise registry lookups shared by auth, registration and admin handlers
pub struct FranchiseService {
    pub franchises: Repository,
}

impl FranchiseService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            franchises: Repository::open(collections::FRANCHISES).await?,
        })
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Document>, DatabaseError> {
        self.franchises
            .select_one(doc! { "franchise_code": normalize_code(code) })
            .await
    }

    /// Franchise visible to the caller, or 404
    pub async fn visible(&self, access: &BranchAccessManager, code: &str) -> Result<Document, ApiError> {
        let code = normalize_code(code);
        let query = access.scoped(Resource::Franchise, doc! { "franchise_code": &code });
        self.franchises
            .select_one(query)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Franchise '{}' not found", code)))
    }

    /// Current status string, served from a short-lived cache
    pub async fn status(&self, code: &str) -> Result<Option<String>, DatabaseError> {
        let code = normalize_code(code);
        if let Some(status) = STATUS_CACHE.get(&code).await {
            return Ok(Some(status));
        }
        let status = self
            .find_by_code(&code)
            .await?
            .and_then(|f| f.get_str("status").ok().map(str::to_string));
        if let Some(status) = &status {
            STATUS_CACHE.insert(code, status.clone()).await;
        }
        Ok(status)
    }

    /// 403 unless the franchise exists and is active
    pub async fn ensure_active(&self, code: &str) -> Result<(), ApiError> {
        let status = self.status(code).await?;
        check_franchise_status(code, status.as_deref())
    }

    pub async fn set_status(&self, code: &str, status: FranchiseStatus) -> Result<Document, ApiError> {
        let code = normalize_code(code);
        let franchise = self
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Franchise '{}' not found", code)))?;
        let id = franchise
            .get_object_id("_id")
            .map_err(|_| ApiError::internal_server_error("Franchise record has no id"))?;

        let updated = self
            .franchises
            .update_404(id, doc! {}, doc! { "status": status.as_str() })
            .await?;
        STATUS_CACHE.invalidate(&code).await;
        tracing::info!("Franchise {} is now {}", code, status.as_str());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_franchises_let_users_in() {
        assert!(check_franchise_status("NORTH", Some("active")).is_ok());

        for status in [FranchiseStatus::Suspended, FranchiseStatus::Inactive] {
            let err = check_franchise_status("NORTH", Some(status.as_str())).unwrap_err();
            assert_eq!(err.status_code(), 403);
            assert!(err.message().contains(status.as_str()));
        }

        let err = check_franchise_status("GHOST", None).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
