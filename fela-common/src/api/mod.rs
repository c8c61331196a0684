//! API module for shared HTTP API functionality
//!
//! This module contains ONLY:
//! - The auth collaborator contract (current user, edit permission, session credentials)
//! - Shared response envelope types
//!
//! HTTP clients live in the crates that use them.

pub mod auth;
pub mod types;

pub use auth::{AuthProvider, CurrentUser, SessionCredentials, StaticAuth};
pub use types::{ErrorBody, ListEnvelope};
