//! OTP verification endpoints: confirm, resend, and re-verify.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::error::AuthError;
use super::policy::SessionPolicy;
use super::types::{ApiResponse, ResendOtpRequest, SessionData, VerifyOtpRequest};

/// Confirm a registration/login challenge; on success the session tokens
/// and profile come back together.
#[utoipa::path(
    post,
    path = "/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code confirmed, session issued", body = ApiResponse<SessionData>),
        (status = 401, description = "Invalid, expired, or missing challenge", body = ApiResponse<SessionData>),
        (status = 429, description = "Attempts exhausted, request a new code", body = ApiResponse<SessionData>)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.verify_otp(&request.email, &request.otp).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Verification successful", data)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Re-issue a code. The response is identical whether or not the email
/// matches an account.
#[utoipa::path(
    post,
    path = "/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = ApiResponse<String>)
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> impl IntoResponse {
    let request: ResendOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.resend_otp(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()>::accepted(
                "If an account exists, a new verification code has been sent",
            )),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consume a `reverify` challenge issued by a stale refresh and mint a new
/// token pair.
#[utoipa::path(
    post,
    path = "/reverify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code confirmed, session issued", body = ApiResponse<SessionData>),
        (status = 401, description = "Invalid, expired, or missing challenge", body = ApiResponse<SessionData>),
        (status = 429, description = "Attempts exhausted, request a new code", body = ApiResponse<SessionData>)
    ),
    tag = "auth"
)]
pub async fn reverify_otp(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.reverify_otp(&request.email, &request.otp).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Re-verification successful", data)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
