//! Registration endpoint.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::error::AuthError;
use super::policy::SessionPolicy;
use super::types::{ApiResponse, RegisterData, RegisterRequest};

/// Create an unverified account and send the registration code. No tokens
/// are issued until the code is confirmed.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification pending", body = ApiResponse<RegisterData>),
        (status = 400, description = "Validation error", body = ApiResponse<RegisterData>)
    ),
    tag = "auth"
)]
pub async fn register(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.register(request).await {
        Ok(data) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(
                "Registration received, check your email for the verification code",
                data,
            )),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
