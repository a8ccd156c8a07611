//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are HS256 JWTs whose
//! `sub` is the user id and whose `exp` is `iat + ttl`.

use std::fmt;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jwt::{Claims, RegisteredClaims, SignWithKey, VerifyWithKey};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no token signing secret configured (set DUET_SECRET_KEY)")]
    MissingSecret,

    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Clone)]
pub struct CredentialService {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialService")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl CredentialService {
    pub fn new(secret: Option<&str>, ttl_minutes: i64) -> Result<Self, CredentialError> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::MissingSecret)?;
        let key = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| CredentialError::MissingSecret)?;
        Ok(Self {
            key,
            ttl: Duration::minutes(ttl_minutes),
        })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on mismatch; `Err` only if the stored hash is malformed.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash).map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, CredentialError> {
        self.issue_token_at(user_id, Utc::now())
    }

    fn issue_token_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<String, CredentialError> {
        let claims = Claims::new(RegisteredClaims {
            subject: Some(user_id.to_string()),
            issued_at: Some(issued_at.timestamp() as u64),
            expiration: Some((issued_at + self.ttl).timestamp() as u64),
            ..Default::default()
        });
        claims
            .sign_with_key(&self.key)
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Check the signature and expiry of `token` and return its subject.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, CredentialError> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(|_| CredentialError::Invalid)?;

        let exp = claims
            .registered
            .expiration
            .and_then(|x| Utc.timestamp_opt(x as i64, 0).single())
            .ok_or(CredentialError::Invalid)?;
        if exp <= Utc::now() {
            return Err(CredentialError::Expired);
        }

        claims
            .registered
            .subject
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(CredentialError::Invalid)
    }
}
