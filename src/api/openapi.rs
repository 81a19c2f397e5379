//! OpenAPI document for the auth surface.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use super::handlers::auth::account::{OtpContext, Role};
use super::handlers::auth::types::{
    ApiResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginData, LoginRequest,
    ProfileVerification, RefreshTokenRequest, RegisterData, RegisterRequest, ResendOtpRequest,
    ResetPasswordRequest, ReverifyRequiredData, SessionData, TokenPairData, UserProfile,
    VerifyOtpRequest, VerifyPasswordRequest,
};
use super::handlers::health::Health;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::register::register,
        crate::api::handlers::auth::login::login,
        crate::api::handlers::auth::verify::verify_otp,
        crate::api::handlers::auth::verify::resend_otp,
        crate::api::handlers::auth::verify::reverify_otp,
        crate::api::handlers::auth::refresh::refresh_token,
        crate::api::handlers::auth::password::forgot_password,
        crate::api::handlers::auth::password::reset_password,
        crate::api::handlers::auth::password::verify_password,
        crate::api::handlers::auth::password::change_password,
    ),
    components(schemas(
        ApiResponse<RegisterData>,
        ApiResponse<LoginData>,
        ApiResponse<SessionData>,
        ApiResponse<TokenPairData>,
        ApiResponse<ReverifyRequiredData>,
        ApiResponse<String>,
        RegisterRequest,
        RegisterData,
        LoginRequest,
        LoginData,
        VerifyOtpRequest,
        ResendOtpRequest,
        RefreshTokenRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        VerifyPasswordRequest,
        ChangePasswordRequest,
        SessionData,
        TokenPairData,
        ReverifyRequiredData,
        UserProfile,
        ProfileVerification,
        Role,
        OtpContext,
        Health,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "auth", description = "Registration, OTP verification, sessions, and passwords"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
