pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;

pub use password::{
    hash_password, hash_password_blocking, validate_password_strength, verify_password,
    verify_password_blocking, PasswordError,
};

/// Token claims. `sub` is the user's ObjectId in hex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub franchise_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        sub: String,
        email: String,
        role: String,
        franchise_code: Option<String>,
        branch_code: Option<String>,
    ) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_expiry(sub, email, role, franchise_code, branch_code, expiry_hours)
    }

    pub fn with_expiry(
        sub: String,
        email: String,
        role: String,
        franchise_code: Option<String>,
        branch_code: Option<String>,
        expiry_hours: u64,
    ) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            email,
            role,
            franchise_code,
            branch_code,
            exp,
            iat: now.timestamp(),
        }
    }

    /// Seconds until expiry, never negative
    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Token has expired")]
    Expired,
    #[error("{0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn decode_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_jwt_with_secret(token, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_jwt_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(hours: u64) -> Claims {
        Claims::with_expiry(
            "65f0c0ffee0000000000abcd".into(),
            "owner@example.com".into(),
            "franchise_admin".into(),
            Some("NORTH-01".into()),
            None,
            hours,
        )
    }

    #[test]
    fn token_round_trip_preserves_tenancy() {
        let original = claims(1);
        let token = generate_jwt_with_secret(&original, "s3cret").unwrap();
        let decoded = decode_jwt_with_secret(&token, "s3cret").unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.expires_in() > 0);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_with_secret(&claims(1), "s3cret").unwrap();
        let err = decode_jwt_with_secret(&token, "other").unwrap_err();
        assert!(matches!(err, JwtError::Invalid(_)));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let mut stale = claims(1);
        stale.iat -= 7200;
        stale.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt_with_secret(&stale, "s3cret").unwrap();
        let err = decode_jwt_with_secret(&token, "s3cret").unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            generate_jwt_with_secret(&claims(1), ""),
            Err(JwtError::InvalidSecret)
        ));
    }
}
