//! API handlers for the Halcyon credential service.
//!
//! Auth flows live in [`auth`]; `health` and `root` are the unauthenticated
//! service surface.

pub mod auth;
pub mod health;
pub mod root;
