//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::api::notify::DeliveryMode;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use crate::cli::globals::GlobalArgs;
use anyhow::{Result, bail};
use tracing::warn;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let auth_opts = auth::Options::parse(matches)?;

    if auth_opts.production && auth_opts.token_secret.is_none() {
        bail!("missing required argument: --token-secret (required in production)");
    }
    if auth_opts.production && dsn.is_none() {
        bail!("missing required argument: --dsn (required in production)");
    }

    let delivery = match auth_opts.otp_delivery.as_str() {
        "log" => DeliveryMode::Log,
        _ => match auth_opts.smtp_relay.clone() {
            Some(relay) => DeliveryMode::Smtp {
                relay,
                from: auth_opts.smtp_from.clone(),
            },
            None if auth_opts.production => {
                bail!("missing required argument: --smtp-relay (required for email delivery in production)");
            }
            None => {
                warn!("no SMTP relay configured; notifications fall back to the log stub");
                DeliveryMode::Log
            }
        },
    };

    let globals = GlobalArgs::new(auth_opts.production, auth_opts.token_secret.clone());

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        remember_access_ttl_seconds: auth_opts.remember_access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        reverify_after_seconds: auth_opts.reverify_after_seconds,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        otp_max_attempts: auth_opts.otp_max_attempts,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
        delivery,
        globals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleared_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("HALCYON_TOKEN_SECRET", None::<&str>),
                ("HALCYON_PRODUCTION", None::<&str>),
                ("HALCYON_DSN", None::<&str>),
                ("HALCYON_OTP_DELIVERY", None::<&str>),
                ("HALCYON_SMTP_RELAY", None::<&str>),
            ],
            f,
        );
    }

    #[test]
    fn production_requires_token_secret() {
        cleared_env(|| {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "halcyon",
                "--production",
                "--dsn",
                "postgres://localhost/halcyon",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--token-secret"));
            }
        });
    }

    #[test]
    fn production_requires_dsn() {
        cleared_env(|| {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "halcyon",
                "--production",
                "--token-secret",
                "secret",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--dsn"));
            }
        });
    }

    #[test]
    fn dev_mode_falls_back_to_log_delivery() -> Result<()> {
        cleared_env(|| {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec!["halcyon"]);
            let action = handler(&matches).expect("dispatch succeeds");
            let Action::Server(args) = action;
            assert_eq!(args.port, 8080);
            assert!(args.dsn.is_none());
            assert!(matches!(args.delivery, DeliveryMode::Log));
            assert!(!args.globals.production);
        });
        Ok(())
    }

    #[test]
    fn smtp_delivery_carries_relay_and_from() {
        cleared_env(|| {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "halcyon",
                "--smtp-relay",
                "smtp.halcyon.health",
                "--smtp-from",
                "Halcyon <no-reply@halcyon.health>",
            ]);
            let Action::Server(args) = handler(&matches).expect("dispatch succeeds");
            match args.delivery {
                DeliveryMode::Smtp { relay, from } => {
                    assert_eq!(relay, "smtp.halcyon.health");
                    assert_eq!(from, "Halcyon <no-reply@halcyon.health>");
                }
                DeliveryMode::Log => panic!("expected SMTP delivery"),
            }
        });
    }

    #[test]
    fn explicit_log_delivery_wins_over_smtp_args() {
        cleared_env(|| {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "halcyon",
                "--otp-delivery",
                "log",
                "--smtp-relay",
                "smtp.halcyon.health",
            ]);
            let Action::Server(args) = handler(&matches).expect("dispatch succeeds");
            assert!(matches!(args.delivery, DeliveryMode::Log));
        });
    }
}
