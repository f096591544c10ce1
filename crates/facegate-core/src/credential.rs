//! Verification credentials.
//!
//! A credential is an HS256 JWT binding (user, guild, guild name) with a short
//! expiry. It is the only authorization the web verifier accepts: no session
//! state, no revocation list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of a freshly issued credential.
pub const DEFAULT_TTL_SECS: i64 = 600;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("invalid or tampered credential")]
    Invalid { expired: bool },
    #[error("credential {field} mismatch")]
    BindingMismatch { field: &'static str },
    #[error("credential signing failed: {0}")]
    Signing(String),
}

/// Decoded credential fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub guild_id: String,
    pub guild_name: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// Fields a presented credential must carry.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedBinding<'a> {
    guild_id: &'a str,
    user_id: Option<&'a str>,
    guild_name: Option<&'a str>,
}

impl<'a> ExpectedBinding<'a> {
    pub fn guild(guild_id: &'a str) -> Self {
        Self { guild_id, user_id: None, guild_name: None }
    }

    pub fn with_user(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_guild_name(mut self, guild_name: &'a str) -> Self {
        self.guild_name = Some(guild_name);
        self
    }

    fn check(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(user_id) = self.user_id {
            if user_id != credential.user_id {
                return Err(CredentialError::BindingMismatch { field: "user_id" });
            }
        }
        if self.guild_id != credential.guild_id {
            return Err(CredentialError::BindingMismatch { field: "guild_id" });
        }
        if let Some(guild_name) = self.guild_name {
            if guild_name != credential.guild_name {
                return Err(CredentialError::BindingMismatch { field: "guild_name" });
            }
        }
        Ok(())
    }
}

pub struct CredentialIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl CredentialIssuer {
    pub fn new(secret: &str) -> Result<Self, CredentialError> {
        Self::with_ttl(secret, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        Ok(Self { key: EncodingKey::from_secret(secret.as_bytes()), ttl })
    }

    pub fn issue(&self, user_id: &str, guild_id: &str, guild_name: &str) -> Result<String, CredentialError> {
        self.issue_at(user_id, guild_id, guild_name, Utc::now())
    }

    /// Issue as if at `now`. Expiry is `now + ttl`.
    pub fn issue_at(
        &self,
        user_id: &str,
        guild_id: &str,
        guild_name: &str,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = Credential {
            user_id: user_id.to_string(),
            guild_id: guild_id.to_string(),
            guild_name: guild_name.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }
}

pub struct CredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(secret: &str) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Ok(Self { key: DecodingKey::from_secret(secret.as_bytes()), validation })
    }

    /// Check signature and expiry, then the expected binding.
    pub fn verify(&self, token: &str, expected: &ExpectedBinding<'_>) -> Result<Credential, CredentialError> {
        let data = decode::<Credential>(token, &self.key, &self.validation).map_err(|e| {
            CredentialError::Invalid { expired: matches!(e.kind(), ErrorKind::ExpiredSignature) }
        })?;
        expected.check(&data.claims)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn pair() -> (CredentialIssuer, CredentialVerifier) {
        (CredentialIssuer::new(SECRET).unwrap(), CredentialVerifier::new(SECRET).unwrap())
    }

    #[test]
    fn test_issue_and_verify_returns_fields() {
        let (issuer, verifier) = pair();
        let token = issuer.issue("42", "7", "G").unwrap();
        let expected = ExpectedBinding::guild("7").with_user("42").with_guild_name("G");

        let credential = verifier.verify(&token, &expected).unwrap();
        assert_eq!(credential.user_id, "42");
        assert_eq!(credential.guild_id, "7");
        assert_eq!(credential.guild_name, "G");
        assert_eq!(credential.exp - credential.iat, DEFAULT_TTL_SECS);
    }

    #[test]
    fn test_expired_credential_rejected() {
        let (issuer, verifier) = pair();
        let issued = Utc::now() - Duration::seconds(DEFAULT_TTL_SECS + 1);
        let token = issuer.issue_at("42", "7", "G", issued).unwrap();

        let err = verifier.verify(&token, &ExpectedBinding::guild("7")).unwrap_err();
        assert_eq!(err, CredentialError::Invalid { expired: true });
    }

    #[test]
    fn test_credential_still_valid_before_ttl() {
        let (issuer, verifier) = pair();
        let issued = Utc::now() - Duration::seconds(DEFAULT_TTL_SECS - 30);
        let token = issuer.issue_at("42", "7", "G", issued).unwrap();
        assert!(verifier.verify(&token, &ExpectedBinding::guild("7")).is_ok());
    }

    #[test]
    fn test_other_guild_is_binding_mismatch() {
        let (issuer, verifier) = pair();
        let token = issuer.issue("42", "A", "Guild A").unwrap();
        let err = verifier.verify(&token, &ExpectedBinding::guild("B")).unwrap_err();
        assert_eq!(err, CredentialError::BindingMismatch { field: "guild_id" });
    }

    #[test]
    fn test_user_and_name_mismatch() {
        let (issuer, verifier) = pair();
        let token = issuer.issue("42", "7", "G").unwrap();

        let err = verifier.verify(&token, &ExpectedBinding::guild("7").with_user("43")).unwrap_err();
        assert_eq!(err, CredentialError::BindingMismatch { field: "user_id" });

        let err = verifier
            .verify(&token, &ExpectedBinding::guild("7").with_guild_name("H"))
            .unwrap_err();
        assert_eq!(err, CredentialError::BindingMismatch { field: "guild_name" });
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let token = CredentialIssuer::new("other-secret").unwrap().issue("42", "7", "G").unwrap();
        let verifier = CredentialVerifier::new(SECRET).unwrap();
        let expected = ExpectedBinding::guild("7");

        assert_eq!(
            verifier.verify(&token, &expected).unwrap_err(),
            CredentialError::Invalid { expired: false }
        );
        assert_eq!(
            verifier.verify("not.a.jwt", &expected).unwrap_err(),
            CredentialError::Invalid { expired: false }
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (issuer, verifier) = pair();
        let token = issuer.issue("42", "7", "G").unwrap();
        let other = issuer.issue("99", "7", "G").unwrap();

        // Splice the payload of one token onto the signature of another.
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(matches!(
            verifier.verify(&forged, &ExpectedBinding::guild("7")),
            Err(CredentialError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(CredentialIssuer::new(""), Err(CredentialError::EmptySecret)));
        assert!(matches!(CredentialVerifier::new(""), Err(CredentialError::EmptySecret)));
    }
}
