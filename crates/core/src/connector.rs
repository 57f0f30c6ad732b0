// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named credential/config blobs for external data sources.

use crate::id::ConnectorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named connector credential/config blob.
///
/// `config` is typically JSON; variable references of the form `{name}`
/// inside it are substituted against the K/V config store at load time
/// (the substitution itself is implemented by `sift-runbook`, which owns
/// config-file parsing; this type only carries the loaded shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connector {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, config: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: ConnectorId::from_string(format!("conn_{}", nanoid::nanoid!(10))),
            name: name.into(),
            kind: kind.into(),
            config,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stamps_equal_timestamps() {
        let now = Utc::now();
        let c = Connector::new("github-main", "github", serde_json::json!({"token": "{GITHUB_TOKEN}"}), now);
        assert_eq!(c.created_at, c.updated_at);
        assert_eq!(c.kind, "github");
    }
}
