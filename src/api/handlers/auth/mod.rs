//! Credential and session lifecycle handlers and supporting modules.
//!
//! This module coordinates registration, OTP identity verification, login,
//! token issuance and refresh, and password reset.
//!
//! ## Session establishment
//!
//! Passwords alone never mint tokens. Every successful password check opens
//! a fresh OTP challenge; only confirming the code issues the access and
//! refresh pair. Sessions without remember-me are silently re-challenged
//! when a refresh arrives more than two hours after the last verified
//! moment.
//!
//! ## Anti-enumeration
//!
//! `/login` returns the same error for unknown emails and wrong passwords,
//! and `/resend-otp` / `/forgot-password` return the same success shape
//! whether or not the account exists.
//!
//! ## Concurrency
//!
//! All account state lives in the credential store as one document per
//! account, written with optimistic compare-and-update. Two concurrent
//! verifications of the same code cannot both succeed.

pub mod account;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod login;
pub mod otp;
pub mod password;
pub mod pg_store;
pub mod policy;
pub mod refresh;
pub mod register;
pub mod state;
pub mod store;
pub mod token;
pub mod types;
mod utils;
pub mod verify;

pub use error::AuthError;
pub use policy::SessionPolicy;
pub use state::AuthConfig;
pub use token::{TokenCodec, TokenConfig};
