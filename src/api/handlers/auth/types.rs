//! Request/response types for auth endpoints.
//!
//! Every body is the `{success, message, data?, code?}` envelope with
//! camelCase fields, which is what the platform's clients already speak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::{Account, Role};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            code: None,
        }
    }

    /// Success envelope with no payload (generic anti-enumeration replies).
    #[must_use]
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            code: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            code: Some(code.into()),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub requires_verification: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub email: String,
    pub requires_verification: bool,
    /// `true` when the pending challenge confirms a login rather than a
    /// first-time registration, so clients can word the prompt accordingly.
    pub is_login_verification: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPasswordRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVerification {
    pub email_verified: bool,
}

/// Public projection of an account; never carries hashes or OTP state.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub verification: ProfileVerification,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            is_active: account.is_active,
            verification: ProfileVerification {
                email_verified: account.verification.email_verified,
            },
            last_login: account.last_login,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    pub remember_me: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairData {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReverifyRequiredData {
    pub requires_otp_reverification: bool,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn envelope_omits_empty_fields() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::<()>::accepted("ok"))?;
        assert!(value.get("data").is_none());
        assert!(value.get("code").is_none());
        assert_eq!(value.get("success"), Some(&serde_json::Value::Bool(true)));
        Ok(())
    }

    #[test]
    fn envelope_failure_carries_code() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::<()>::failure("nope", "INVALID_OTP"))?;
        assert_eq!(
            value.get("code").and_then(serde_json::Value::as_str),
            Some("INVALID_OTP")
        );
        assert_eq!(value.get("success"), Some(&serde_json::Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn login_request_fields_are_camel_case() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": "Password123!",
            "rememberMe": true,
        }))?;
        assert_eq!(request.remember_me, Some(true));
        Ok(())
    }

    #[test]
    fn profile_hides_credential_material() -> Result<()> {
        let account = Account::new(
            "bob@example.com".to_string(),
            "bob@example.com".to_string(),
            "$argon2id$stub".to_string(),
            Role::Provider,
            "Bob".to_string(),
            "Jones".to_string(),
            Utc::now(),
        );
        let value = serde_json::to_value(UserProfile::from(&account))?;
        let text = value.to_string();
        assert!(!text.contains("argon2id"));
        assert!(!text.contains("otp"));
        let email_verified = value
            .pointer("/verification/emailVerified")
            .context("missing verification state")?;
        assert_eq!(email_verified, &serde_json::Value::Bool(false));
        Ok(())
    }
}
