//! HTTP handlers for the CrediLink API

pub mod auth;
pub mod profile;

pub use crate::middleware::AuthenticatedUser;
