//! # FELA Common Library
//!
//! Shared code for the FELA catalogue intake tooling including:
//! - Error types
//! - Configuration loading (CLI → ENV → TOML → defaults)
//! - Reference entity kinds
//! - Event types (FelaEvent enum) and the EventBus
//! - Session/auth collaborator types

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod reference;

pub use error::{Error, Result};
pub use reference::ReferenceKind;
