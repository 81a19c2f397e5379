//! Login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::error::AuthError;
use super::policy::SessionPolicy;
use super::types::{ApiResponse, LoginData, LoginRequest};

/// Check the password and open a fresh OTP challenge. Tokens are only
/// issued once the code is confirmed via `/verify-otp`.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Password accepted, verification code sent", body = ApiResponse<LoginData>),
        (status = 401, description = "Invalid credentials", body = ApiResponse<LoginData>),
        (status = 403, description = "Account deactivated", body = ApiResponse<LoginData>)
    ),
    tag = "auth"
)]
pub async fn login(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.login(request).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Check your email for the verification code",
                data,
            )),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
