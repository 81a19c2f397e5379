//! The account document owned by the credential store.
//!
//! One JSON document per account. Every mutation goes through the store's
//! compare-and-update so concurrent requests against the same account are
//! linearized on `version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform roles. Self-registration is limited to `user` and `provider`;
/// admin roles are provisioned out of band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Provider,
    Admin,
    SuperAdmin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Provider => "provider",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Parse a role requested at registration. Only non-privileged roles are
    /// accepted here.
    #[must_use]
    pub fn parse_registerable(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "provider" => Some(Self::Provider),
            _ => None,
        }
    }
}

/// Why an OTP challenge was issued. Carried through every layer so the
/// verification step knows which follow-up (welcome email, login alert,
/// silent re-verification) applies, instead of inferring it from
/// `email_verified` after the fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OtpContext {
    Registration,
    Login,
    Reverify,
}

/// Pending OTP challenge state. Only the sha256 of the code is kept; the
/// plaintext exists solely in the outbound notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationState {
    pub email_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_attempts: u32,
    pub otp_context: Option<OtpContext>,
}

impl VerificationState {
    #[must_use]
    pub fn has_pending_challenge(&self) -> bool {
        self.otp_hash.is_some()
    }
}

/// Password reset token state; hash only, single use.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetState {
    pub token_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PasswordResetState {
    pub fn clear(&mut self) {
        self.token_hash = None;
        self.expires_at = None;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub email_normalized: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub first_name: String,
    pub last_name: String,
    pub verification: VerificationState,
    pub password_reset: PasswordResetState,
    pub remember_me: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub last_otp_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the store on every
    /// successful compare-and-update.
    #[serde(default)]
    pub version: i64,
}

impl Account {
    #[must_use]
    pub fn new(
        email: String,
        email_normalized: String,
        password_hash: String,
        role: Role,
        first_name: String,
        last_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            email_normalized,
            password_hash,
            role,
            is_active: true,
            first_name,
            last_name,
            verification: VerificationState::default(),
            password_reset: PasswordResetState::default(),
            remember_me: false,
            last_login: None,
            last_otp_verified_at: None,
            created_at: now,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn account() -> Account {
        Account::new(
            "Alice@Example.com".to_string(),
            "alice@example.com".to_string(),
            "$argon2id$stub".to_string(),
            Role::User,
            "Alice".to_string(),
            "Smith".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn new_account_starts_unverified() {
        let account = account();
        assert!(!account.verification.email_verified);
        assert!(!account.verification.has_pending_challenge());
        assert!(account.is_active);
        assert_eq!(account.version, 0);
        assert!(account.last_otp_verified_at.is_none());
    }

    #[test]
    fn role_rejects_privileged_registration() {
        assert_eq!(Role::parse_registerable("user"), Some(Role::User));
        assert_eq!(Role::parse_registerable(" Provider "), Some(Role::Provider));
        assert_eq!(Role::parse_registerable("admin"), None);
        assert_eq!(Role::parse_registerable("super_admin"), None);
    }

    #[test]
    fn role_serializes_snake_case() -> Result<()> {
        assert_eq!(serde_json::to_value(Role::SuperAdmin)?, "super_admin");
        assert_eq!(serde_json::to_value(Role::Provider)?, "provider");
        Ok(())
    }

    #[test]
    fn account_document_round_trips() -> Result<()> {
        let account = account();
        let value = serde_json::to_value(&account)?;
        let decoded: Account = serde_json::from_value(value)?;
        assert_eq!(decoded.id, account.id);
        assert_eq!(decoded.email_normalized, "alice@example.com");
        assert_eq!(decoded.role, Role::User);
        Ok(())
    }
}
