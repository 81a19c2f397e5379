//! Token refresh endpoint.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::error::AuthError;
use super::policy::{RefreshOutcome, SessionPolicy};
use super::types::{ApiResponse, RefreshTokenRequest, ReverifyRequiredData, TokenPairData};

/// Exchange a refresh token for a new pair. Sessions without remember-me
/// whose last verified moment is too old get a `reverify` challenge
/// instead of tokens; the client completes it via `/reverify-otp`.
#[utoipa::path(
    post,
    path = "/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair, or a pending re-verification challenge", body = ApiResponse<TokenPairData>),
        (status = 401, description = "Invalid or expired refresh token", body = ApiResponse<TokenPairData>),
        (status = 403, description = "Account deactivated", body = ApiResponse<TokenPairData>)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    policy: Extension<Arc<SessionPolicy>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    let request: RefreshTokenRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Validation("Missing payload".to_string()).into_response();
        }
    };

    match policy.refresh(&request.refresh_token).await {
        Ok(RefreshOutcome::Refreshed(pair)) => (
            StatusCode::OK,
            Json(ApiResponse::ok("Token refreshed", pair)),
        )
            .into_response(),
        Ok(RefreshOutcome::ReverificationRequired { email }) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Re-verification required, check your email for the code",
                ReverifyRequiredData {
                    requires_otp_reverification: true,
                    email,
                },
            )),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
