//! Bearer credential verification.
//!
//! Token issuance lives elsewhere; this module only turns a presented
//! credential into a [`VerifiedIdentity`] or refuses it.

use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subject whose credential has been checked by an [`IdentityVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    subject_id: String,
    username: Option<String>,
}

impl VerifiedIdentity {
    /// Identity for an already-checked subject.
    pub fn new(subject_id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            username,
        }
    }

    /// Stable user id; never empty once verified.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Display name from the token, if it carried one.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// Why a credential was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unauthenticated {
    /// Nothing was presented.
    #[error("No authentication token provided")]
    MissingCredential,

    /// Bad signature, expired, or not a token at all.
    #[error("Invalid authentication token: {0}")]
    InvalidCredential(String),

    /// Token verified but names no user.
    #[error("Identity carries no subject")]
    MissingSubject,
}

/// Turns a presented bearer credential into an identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `credential`. Implementations must not panic on garbage input.
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, Unauthenticated>;
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id, serialized as `userId`.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// HS256 verifier backed by a shared secret.
pub struct JwtIdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtIdentityVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityVerifier {
    /// Verifier for tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode and validate without going through the async trait.
    pub fn verify_sync(&self, credential: &str) -> Result<VerifiedIdentity, Unauthenticated> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.validation)
            .map_err(|err| Unauthenticated::InvalidCredential(err.to_string()))?;

        let claims = data.claims;
        if claims.user_id.trim().is_empty() {
            return Err(Unauthenticated::MissingSubject);
        }

        Ok(VerifiedIdentity::new(claims.user_id, claims.username))
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, Unauthenticated> {
        self.verify_sync(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(user_id: &str, exp_offset: Duration, secret: &str) -> String {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            username: Some("operator".into()),
            exp: (now + exp_offset).timestamp(),
            iat: Some(now.timestamp()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let verifier = JwtIdentityVerifier::new(SECRET);
        let identity = verifier
            .verify(&token("user-1", Duration::hours(1), SECRET))
            .await
            .unwrap();

        assert_eq!(identity.subject_id(), "user-1");
        assert_eq!(identity.username(), Some("operator"));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let verifier = JwtIdentityVerifier::new(SECRET);
        let result = verifier
            .verify(&token("user-1", Duration::hours(-2), SECRET))
            .await;
        assert!(matches!(result, Err(Unauthenticated::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn rejects_token_signed_with_other_secret() {
        let verifier = JwtIdentityVerifier::new(SECRET);
        let result = verifier
            .verify(&token("user-1", Duration::hours(1), "other-secret"))
            .await;
        assert!(matches!(result, Err(Unauthenticated::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn rejects_blank_subject_and_garbage() {
        let verifier = JwtIdentityVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(&token("", Duration::hours(1), SECRET)).await,
            Err(Unauthenticated::MissingSubject)
        );
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }
}
