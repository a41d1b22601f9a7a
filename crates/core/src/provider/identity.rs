//! Normalized provider identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-insensitive, alphanumeric key derived from a human-readable provider name.
///
/// This is the join key shared by the performance tracker, the timeout engine and
/// the latency store, so "The Pirate Bay", "thepiratebay" and "THE-PIRATE-BAY" all
/// refer to the same provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    /// Normalize a display name into a provider id.
    ///
    /// Lowercases and drops every non-alphanumeric character. Applying it twice
    /// yields the same id.
    pub fn normalize(name: &str) -> Self {
        Self(
            name.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(name: &str) -> Self {
        Self::normalize(name)
    }
}

impl From<String> for ProviderId {
    fn from(name: String) -> Self {
        Self::normalize(&name)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
