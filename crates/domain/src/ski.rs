//! Subject Key Identifier — the stable key a remote device is known by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable identifier of a remote device, derived from its certificate.
///
/// Stored trimmed and lowercased so lookups do not depend on how the
/// identifier was typed in configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ski(String);

impl Ski {
    /// Normalise and validate a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySki`] when the identifier is blank.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalised = raw.as_ref().trim().to_ascii_lowercase();
        if normalised.is_empty() {
            return Err(ValidationError::EmptySki);
        }
        Ok(Self(normalised))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ski {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ski {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ski {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ski> for String {
    fn from(ski: Ski) -> Self {
        ski.0
    }
}
