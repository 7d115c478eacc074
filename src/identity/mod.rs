//! Identity records
//!
//! One record per wallet claim, created on first successful sign-in and
//! edited through profile updates afterwards.

mod registry;

pub use registry::{IdentityRegistry, RegistryError};
