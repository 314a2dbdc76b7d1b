//! Configuration version tokens.
//!
//! A [`VersionToken`] is the `major.minor.patch` triple stored in the install's
//! `.env` file. Tokens are ordered lexicographically on their components, and
//! `0.0.0` is reserved as the "never configured" sentinel.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Version of the configuration layout this binary migrates to by default.
pub const CURRENT_VERSION: VersionToken = VersionToken::new(0, 6, 1);

/// A `major.minor.patch` configuration version.
///
/// Field order matters: the derived `Ord` compares `major`, then `minor`,
/// then `patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionToken {
    major: u32,
    minor: u32,
    patch: u32,
}

impl VersionToken {
    /// The "never configured" sentinel.
    pub const UNSET: VersionToken = VersionToken::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `major.minor.patch` string.
    ///
    /// Surrounding whitespace is ignored. Each component must be a non-empty
    /// run of ASCII digits that fits in a `u32`; signs, pre-release suffixes
    /// and missing components are rejected.
    ///
    /// ```
    /// use brewctl::VersionToken;
    ///
    /// let v = VersionToken::parse("0.3.0").unwrap();
    /// assert_eq!(v, VersionToken::new(0, 3, 0));
    /// assert!(VersionToken::parse("0.3").is_err());
    /// assert!(VersionToken::parse("1.2.3-rc1").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let invalid = || Error::InvalidVersionFormat(text.to_string());

        let mut parts = trimmed.split('.');
        let mut next = || -> Result<u32> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };

        let major = next()?;
        let minor = next()?;
        let patch = next()?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }

    /// True iff this is the `0.0.0` sentinel.
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Serialized as the dotted string so config files read naturally.
impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionToken::parse(&raw).map_err(serde::de::Error::custom)
    }
}
