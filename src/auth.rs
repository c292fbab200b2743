//! Password hashing and bearer tokens.
//!
//! Passwords are stored as bcrypt hashes. Sessions are stateless HS256
//! JWTs whose `sub` is the user id; the signing secret never leaves a
//! `SecretString`.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::KantorError;

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per JWT convention.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Signing and verification keys plus token lifetime.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenKeys {
    pub fn new(secret: &SecretString, ttl_secs: u64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user_id` valid for the configured lifetime.
    pub fn issue(&self, user_id: i64) -> Result<String, KantorError> {
        let exp = Utc::now().timestamp().saturating_add(self.ttl_secs);
        self.issue_with_expiry(user_id, exp)
    }

    fn issue_with_expiry(&self, user_id: i64, exp: i64) -> Result<String, KantorError> {
        let claims = Claims { sub: user_id.to_string(), exp };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| KantorError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<i64, KantorError> {
        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "Token rejected");
            KantorError::InvalidToken
        })?;

        data.claims.sub.parse::<i64>().map_err(|_| KantorError::InvalidToken)
    }
}

/// Hash a password with bcrypt at the given cost.
///
/// CPU-bound; call from a blocking task.
pub fn hash_password(password: &str, cost: u32) -> Result<String, KantorError> {
    bcrypt::hash(password, cost).map_err(|e| KantorError::Internal(format!("failed to hash password: {e}")))
}

/// Compare a password with a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Pull the token out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` as well as a bare token.
pub fn extract_token(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim();
    (!token.is_empty()).then_some(token)
}
