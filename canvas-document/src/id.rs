//! ULID identifiers for documents, artboards and nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::{DocumentError, DocumentResult};

/// Length of the canonical ULID text form.
pub const ID_LEN: usize = 26;

/// Unique, time-ordered identifier.
///
/// Serialized as the 26-character Crockford base32 string, so ids sort
/// lexicographically in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Ulid);

impl Id {
    /// Create a new unique id.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Create from an existing ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Create from the raw 128-bit value. Mostly useful for fixtures.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Ulid(value))
    }

    /// Parse an id from its text form.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidId`] if `s` is not a 26-character ULID.
    pub fn parse(s: &str) -> DocumentResult<Self> {
        if s.len() != ID_LEN {
            return Err(DocumentError::InvalidId(s.to_string()));
        }
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| DocumentError::InvalidId(s.to_string()))
    }

    /// Check whether a string is a syntactically valid id.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// The wrapped ULID.
    #[must_use]
    pub const fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
