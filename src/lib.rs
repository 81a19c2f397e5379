//! # Halcyon (Credential & Session Lifecycle Service)
//!
//! `halcyon` is the credential and session authority for the Halcyon
//! wellbeing platform. It handles registration, OTP identity verification,
//! login, access/refresh token issuance, and password reset for patients,
//! providers, and administrators.
//!
//! ## Session establishment
//!
//! A correct password never mints tokens on its own. Every successful
//! password check opens a fresh one-time-passcode challenge delivered out
//! of band; confirming the code issues the signed access/refresh pair.
//! Sessions without the remember-me opt-in are silently re-challenged when
//! a refresh arrives more than two hours after the last verified moment,
//! bounding the exposure window of a stolen refresh token.
//!
//! ## Credential store
//!
//! All durable state lives in the credential store as one document per
//! account, written with optimistic compare-and-update. There is no shared
//! in-process session state, so any number of instances can serve the same
//! store.
//!
//! ## Anti-enumeration
//!
//! Login returns the same error for unknown emails and wrong passwords,
//! and resend/forgot-password endpoints return the same success shape
//! whether or not the account exists.

pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
