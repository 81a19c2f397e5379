//! Typed authentication failures and their wire mapping.
//!
//! Every failure path out of the policy engine is one of these variants;
//! raw storage or crypto errors never cross the handler boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use super::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password map to the same variant so login
    /// never reveals which factor failed.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidOtp,
    #[error("Verification code has expired")]
    OtpExpired,
    #[error("Too many verification attempts, request a new code")]
    TooManyAttempts,
    #[error("No pending verification for this account")]
    AccountNotFound,
    #[error("Account is deactivated")]
    AccountDeactivated,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("{0}")]
    Validation(String),
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    /// Stable machine-readable code; clients branch on this, not the message.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidOtp => "INVALID_OTP",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::InvalidOtp
            | Self::OtpExpired
            | Self::AccountNotFound
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidPassword => StatusCode::UNAUTHORIZED,
            Self::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            Self::AccountDeactivated => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref source) = self {
            // The wire message stays generic; the cause goes to the log only.
            error!("internal auth error: {source:#}");
        }
        let body = ApiResponse::<()>::failure(self.to_string(), self.code());
        (self.status(), Json(body)).into_response()
    }
}
