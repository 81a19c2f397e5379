//! Password endpoints: forgot, reset, verify, and change.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::error::AuthError;
use super::extract::CurrentAccount;
use super::policy::SessionPolicy;
use super::types::{
    ApiResponse, ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest,
    VerifyPasswordRequest,
};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

/// Start a password reset. The response shape is byte-identical whether or
/// not the email matches an account.
#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = ApiResponse<String>)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.forgot_password(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::accepted(FORGOT_PASSWORD_MESSAGE)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consume a reset token and set the new password.
#[utoipa::path(
    post,
    path = "/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = ApiResponse<String>),
        (status = 400, description = "Weak password", body = ApiResponse<String>),
        (status = 401, description = "Invalid or expired reset token", body = ApiResponse<String>)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy
        .reset_password(&request.token, &request.password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::accepted(
                "Password has been reset, you can sign in now",
            )),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Confirm the caller's password before a sensitive action.
#[utoipa::path(
    post,
    path = "/verify-password",
    request_body = VerifyPasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Password confirmed", body = ApiResponse<String>),
        (status = 401, description = "Invalid password or missing bearer token", body = ApiResponse<String>)
    ),
    tag = "auth"
)]
pub async fn verify_password(
    policy: Extension<Arc<SessionPolicy>>,
    CurrentAccount(account): CurrentAccount,
    payload: Option<Json<VerifyPasswordRequest>>,
) -> impl IntoResponse {
    let request: VerifyPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.verify_password(&account, &request.password).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::accepted("Password confirmed")),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Replace the password after confirming the current one.
#[utoipa::path(
    post,
    path = "/change-password",
    request_body = ChangePasswordRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Weak password", body = ApiResponse<String>),
        (status = 401, description = "Current password mismatch or missing bearer token", body = ApiResponse<String>)
    ),
    tag = "auth"
)]
pub async fn change_password(
    policy: Extension<Arc<SessionPolicy>>,
    CurrentAccount(account): CurrentAccount,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let request: ChangePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy
        .change_password(account.id, &request.current_password, &request.new_password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::accepted("Password changed")),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
