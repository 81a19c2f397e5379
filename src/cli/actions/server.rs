use crate::{
    api,
    api::handlers::auth::AuthConfig,
    api::notify::DeliveryMode,
    cli::{actions::Action, globals::GlobalArgs},
};
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub remember_access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reverify_after_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: u32,
    pub reset_token_ttl_seconds: i64,
    pub delivery: DeliveryMode,
    pub globals: GlobalArgs,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the signing secret policy rejects the configuration
/// or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server(args) = action;

    debug!("Server args: {:?}", args);

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_remember_access_ttl_seconds(args.remember_access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
        .with_reverify_after_seconds(args.reverify_after_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_otp_max_attempts(args.otp_max_attempts)
        .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds);

    let token_config = args.globals.token_config();

    api::new(
        args.port,
        args.dsn,
        &token_config,
        auth_config,
        args.delivery,
    )
    .await
}
