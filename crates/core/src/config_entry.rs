// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The case-insensitive key/value config entry (§3 `KeyValuePair`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a config key: lowercase and trim whitespace.
///
/// Every lookup and write against the config store goes through this so
/// `set("X", v)` and `get("  x  ")` observe the same entry (§8 KV case
/// insensitivity property).
pub fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Always the normalized form of the key that was written.
    pub key: String,
    pub value: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyValuePair {
    pub fn new(key: &str, value: impl Into<String>, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: normalize(key),
            value: value.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  X  "), "x");
        assert_eq!(normalize("Foo_Bar"), "foo_bar");
    }

    #[test]
    fn new_normalizes_key() {
        let kv = KeyValuePair::new("  Api.Token  ", "secret", "", Utc::now());
        assert_eq!(kv.key, "api.token");
    }
}
