//! Signed access/refresh token codec.
//!
//! HS256 with a process-wide key, read-only after startup. Verification
//! returns a verdict instead of an error so callers branch rather than
//! bubble crypto failures to clients.

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::account::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug)]
pub enum TokenVerdict {
    Valid(Claims),
    Expired,
    Invalid,
}

/// Signing secret selection policy.
///
/// A configured secret is always preferred. Without one, production refuses
/// to start; outside production a process-lifetime random secret is used,
/// which means tokens stop verifying after a restart.
pub struct TokenConfig {
    secret: Option<SecretString>,
    production: bool,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: Option<SecretString>, production: bool) -> Self {
        Self { secret, production }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("production", &self.production)
            .finish()
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    /// Build the codec from configuration.
    ///
    /// # Errors
    /// Returns an error when production mode is set and no secret is
    /// configured.
    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        match &config.secret {
            Some(secret) => Ok(Self::from_secret(secret.expose_secret().as_bytes())),
            None if config.production => Err(anyhow!(
                "HALCYON_TOKEN_SECRET is required in production; refusing to start with an ephemeral signing secret"
            )),
            None => {
                warn!(
                    "no signing secret configured; using an ephemeral secret, issued tokens will not verify after a restart"
                );
                let mut secret = [0u8; 32];
                OsRng
                    .try_fill_bytes(&mut secret)
                    .context("failed to generate ephemeral signing secret")?;
                Ok(Self::from_secret(&secret))
            }
        }
    }

    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a token for `subject` with the caller-supplied lifetime.
    ///
    /// # Errors
    /// Returns an error if claim serialization fails.
    pub fn sign(
        &self,
        subject: Uuid,
        role: Role,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject,
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")
    }

    /// Validate signature and expiry. Never panics and never returns a raw
    /// crypto error.
    #[must_use]
    pub fn verify(&self, token: &str) -> TokenVerdict {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token.trim(), &self.decoding, &validation) {
            Ok(data) => TokenVerdict::Valid(data.claims),
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => TokenVerdict::Expired,
            Err(_) => TokenVerdict::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::from_secret(b"test-secret-test-secret-test-secr")
    }

    #[test]
    fn sign_verify_round_trip() -> Result<()> {
        let codec = codec();
        let subject = Uuid::new_v4();
        let token = codec.sign(subject, Role::User, TokenType::Access, Duration::hours(2))?;
        match codec.verify(&token) {
            TokenVerdict::Valid(claims) => {
                assert_eq!(claims.sub, subject);
                assert_eq!(claims.role, Role::User);
                assert_eq!(claims.token_type, TokenType::Access);
                assert!(claims.exp > claims.iat);
            }
            other => panic!("expected valid verdict, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn refresh_tokens_carry_their_type() -> Result<()> {
        let codec = codec();
        let token = codec.sign(
            Uuid::new_v4(),
            Role::Provider,
            TokenType::Refresh,
            Duration::days(7),
        )?;
        match codec.verify(&token) {
            TokenVerdict::Valid(claims) => assert_eq!(claims.token_type, TokenType::Refresh),
            other => panic!("expected valid verdict, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn expired_token_is_expired_not_invalid() -> Result<()> {
        let codec = codec();
        let token = codec.sign(
            Uuid::new_v4(),
            Role::User,
            TokenType::Access,
            Duration::seconds(-120),
        )?;
        assert!(matches!(codec.verify(&token), TokenVerdict::Expired));
        Ok(())
    }

    #[test]
    fn tampered_token_is_invalid() -> Result<()> {
        let codec = codec();
        let token = codec.sign(Uuid::new_v4(), Role::User, TokenType::Access, Duration::hours(2))?;
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(matches!(codec.verify(&tampered), TokenVerdict::Invalid));
        assert!(matches!(codec.verify("not-a-token"), TokenVerdict::Invalid));
        Ok(())
    }

    #[test]
    fn ephemeral_codecs_do_not_cross_verify() -> Result<()> {
        let config = TokenConfig::new(None, false);
        let first = TokenCodec::from_config(&config)?;
        let second = TokenCodec::from_config(&config)?;
        let token = first.sign(Uuid::new_v4(), Role::User, TokenType::Access, Duration::hours(2))?;
        assert!(matches!(first.verify(&token), TokenVerdict::Valid(_)));
        assert!(matches!(second.verify(&token), TokenVerdict::Invalid));
        Ok(())
    }

    #[test]
    fn production_requires_a_configured_secret() {
        let config = TokenConfig::new(None, true);
        assert!(TokenCodec::from_config(&config).is_err());

        let config = TokenConfig::new(Some(SecretString::from("configured-secret")), true);
        assert!(TokenCodec::from_config(&config).is_ok());
    }

    #[test]
    fn token_config_debug_redacts_secret() {
        let config = TokenConfig::new(Some(SecretString::from("super-secret")), false);
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }
}
