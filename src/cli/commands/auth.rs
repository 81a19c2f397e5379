use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_PRODUCTION: &str = "production";
pub const ARG_OTP_DELIVERY: &str = "otp-delivery";

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_otp_args(command);
    with_delivery_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Signing secret for access/refresh tokens")
                .long_help(
                    "Signing secret for access/refresh tokens. Without it a random process-lifetime secret is used and issued tokens stop verifying after a restart; production mode refuses to start without it.",
                )
                .env("HALCYON_TOKEN_SECRET"),
        )
        .arg(
            Arg::new(ARG_PRODUCTION)
                .long("production")
                .help("Production mode: the token secret becomes mandatory")
                .env("HALCYON_PRODUCTION")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and password reset links")
                .env("HALCYON_FRONTEND_BASE_URL")
                .default_value("https://app.halcyon.health"),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("HALCYON_ACCESS_TTL_SECONDS")
                .default_value("7200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("remember-access-ttl-seconds")
                .long("remember-access-ttl-seconds")
                .help("Access token TTL in seconds when remember-me is set")
                .env("HALCYON_REMEMBER_ACCESS_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("HALCYON_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reverify-after-seconds")
                .long("reverify-after-seconds")
                .help("Refresh without remember-me forces a new code after this gap")
                .env("HALCYON_REVERIFY_AFTER_SECONDS")
                .default_value("7200")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("Verification code TTL in seconds")
                .env("HALCYON_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-max-attempts")
                .long("otp-max-attempts")
                .help("Failed attempts before a code is locked out")
                .env("HALCYON_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token TTL in seconds")
                .env("HALCYON_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_delivery_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_DELIVERY)
                .long("otp-delivery")
                .help("Where verification codes go: email (SMTP) or log (dev stub)")
                .env("HALCYON_OTP_DELIVERY")
                .default_value("email")
                .value_parser(["email", "log"]),
        )
        .arg(
            Arg::new("smtp-relay")
                .long("smtp-relay")
                .help("SMTP relay host for outbound notifications")
                .env("HALCYON_SMTP_RELAY"),
        )
        .arg(
            Arg::new("smtp-from")
                .long("smtp-from")
                .help("From address for outbound notifications")
                .env("HALCYON_SMTP_FROM")
                .default_value("Halcyon <no-reply@halcyon.health>"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: Option<SecretString>,
    pub production: bool,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub remember_access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reverify_after_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: u32,
    pub reset_token_ttl_seconds: i64,
    pub otp_delivery: String,
    pub smtp_relay: Option<String>,
    pub smtp_from: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_i64 = |name: &str| -> i64 { matches.get_one::<i64>(name).copied().unwrap_or(0) };
        Ok(Self {
            token_secret: matches
                .get_one::<String>(ARG_TOKEN_SECRET)
                .cloned()
                .map(SecretString::from),
            production: matches.get_flag(ARG_PRODUCTION),
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .unwrap_or_default(),
            access_ttl_seconds: get_i64("access-ttl-seconds"),
            remember_access_ttl_seconds: get_i64("remember-access-ttl-seconds"),
            refresh_ttl_seconds: get_i64("refresh-ttl-seconds"),
            reverify_after_seconds: get_i64("reverify-after-seconds"),
            otp_ttl_seconds: get_i64("otp-ttl-seconds"),
            otp_max_attempts: matches
                .get_one::<u32>("otp-max-attempts")
                .copied()
                .unwrap_or(5),
            reset_token_ttl_seconds: get_i64("reset-token-ttl-seconds"),
            otp_delivery: matches
                .get_one::<String>(ARG_OTP_DELIVERY)
                .cloned()
                .unwrap_or_else(|| "email".to_string()),
            smtp_relay: matches.get_one::<String>("smtp-relay").cloned(),
            smtp_from: matches
                .get_one::<String>("smtp-from")
                .cloned()
                .unwrap_or_default(),
        })
    }
}
