//! Utility modules for fela-intake

pub mod normalize;

pub use normalize::{names_match, normalize_name, similarity};
