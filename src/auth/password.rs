use crate::config;

/// Minimum password length accepted at registration and password change
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, config::config().security.bcrypt_cost)
}

/// Returns false for malformed hashes instead of erroring, so a corrupt
/// stored hash reads the same as a wrong password.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Password hash verification failed: {}", e);
            false
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("Password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// [`hash_password`] on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(validate_password_strength("abc12345").is_ok());
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("allletters").is_err());
        assert!(validate_password_strength("12345678").is_err());
    }

    #[test]
    fn verify_against_bcrypt_hash() {
        let hash = bcrypt::hash("learning123", 4).unwrap();
        assert!(verify_password("learning123", &hash));
        assert!(!verify_password("learning124", &hash));
        assert!(!verify_password("learning123", "not-a-hash"));
    }

    #[tokio::test]
    async fn blocking_pool_verification() {
        let hash = bcrypt::hash("learning123", 4).unwrap();
        assert!(verify_password_blocking("learning123".into(), hash.clone()).await);
        assert!(!verify_password_blocking("nope".into(), hash).await);
    }
}
