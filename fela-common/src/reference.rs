//! Reference entity kinds shared by every FELA crate
//!
//! Countries, cities, agencies and speakers are the reference tables the
//! backend keeps and reuses across events. Countries and cities carry
//! coordinates; agencies and speakers do not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Country,
    City,
    Agency,
    Speaker,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Country,
        ReferenceKind::City,
        ReferenceKind::Agency,
        ReferenceKind::Speaker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Country => "country",
            ReferenceKind::City => "city",
            ReferenceKind::Agency => "agency",
            ReferenceKind::Speaker => "speaker",
        }
    }

    /// Backend collection path segment (e.g. `countries`)
    pub fn collection(&self) -> &'static str {
        match self {
            ReferenceKind::Country => "countries",
            ReferenceKind::City => "cities",
            ReferenceKind::Agency => "agencies",
            ReferenceKind::Speaker => "speakers",
        }
    }

    /// Whether a resolved entity of this kind must carry coordinates
    pub fn has_coordinates(&self) -> bool {
        matches!(self, ReferenceKind::Country | ReferenceKind::City)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" | "countries" => Ok(ReferenceKind::Country),
            "city" | "cities" => Ok(ReferenceKind::City),
            "agency" | "agencies" => Ok(ReferenceKind::Agency),
            "speaker" | "speakers" => Ok(ReferenceKind::Speaker),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown reference kind: {}",
                other
            ))),
        }
    }
}
