//! CrediLink auth server library
//!
//! Wallet challenge-response authentication: single-use nonces, `personal_sign`
//! signer recovery, an identity registry keyed by (address, role), and
//! revocable bearer sessions.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
