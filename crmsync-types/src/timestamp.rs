//! Canonical sync timestamps.
//!
//! Conflict detection compares `YYYY-MM-DD HH:MM:SS` strings lexically. The
//! format is fixed-width and zero-padded, so lexical order matches
//! chronological order for every year in `0000..=9999`. Stored values are
//! always in this form; incoming remote values are compared as sent.

use crate::error::{TypesError, TypesResult};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `strftime` pattern of the canonical form.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A UTC instant rendered in the canonical `YYYY-MM-DD HH:MM:SS` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncTimestamp(String);

impl SyncTimestamp {
    /// Parses a canonical timestamp. Anything that does not round-trip to
    /// the exact same string (missing padding, trailing zone, fractional
    /// seconds) is rejected.
    pub fn parse(s: &str) -> TypesResult<Self> {
        let dt = NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT)
            .map_err(|_| TypesError::InvalidTimestamp(s.to_string()))?;
        let canonical = dt.format(CANONICAL_FORMAT).to_string();
        if canonical != s {
            return Err(TypesError::InvalidTimestamp(s.to_string()));
        }
        Ok(Self(canonical))
    }

    /// Renders a naive UTC datetime, dropping sub-second precision.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.format(CANONICAL_FORMAT).to_string())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now().naive_utc())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_datetime(&self) -> NaiveDateTime {
        // Construction guarantees the canonical form.
        NaiveDateTime::parse_from_str(&self.0, CANONICAL_FORMAT).unwrap_or_default()
    }

    /// True when this instant is at or after `other`, compared lexically.
    pub fn is_at_or_after(&self, other: &str) -> bool {
        self.0.as_str() >= other
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SyncTimestamp {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SyncTimestamp> for String {
    fn from(ts: SyncTimestamp) -> Self {
        ts.0
    }
}
