//! Name normalization for reference identity
//!
//! Reference entities are identified by name, case- and diacritic-insensitively:
//! "México", "mexico" and " MEXICO " are the same country.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a name for identity comparison.
///
/// Performs:
/// - Unicode NFD decomposition with combining marks stripped
/// - Lowercase conversion
/// - Whitespace trimming and collapsing
///
/// # Examples
///
/// ```
/// use fela_intake::utils::normalize_name;
///
/// assert_eq!(normalize_name("México"), "mexico");
/// assert_eq!(normalize_name("  São   Paulo "), "sao paulo");
/// ```
pub fn normalize_name(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when both names normalize to the same non-empty string
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    !a.is_empty() && a == normalize_name(b)
}

/// Jaro-Winkler similarity of the normalized names (0.0-1.0)
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&normalize_name(a), &normalize_name(b))
}
