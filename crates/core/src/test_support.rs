// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for tests across this crate and its dependants.
//!
//! Gated behind the `test-support` feature so downstream crates can pull
//! these helpers into their own `dev-dependencies` without compiling them
//! into release builds.

use crate::clock::FakeClock;
use crate::job_definition::{JobDefinition, Step};
use chrono::{DateTime, Utc};

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid fixed timestamp")
}

pub fn fake_clock() -> FakeClock {
    let clock = FakeClock::new();
    clock.set(fixed_time());
    clock
}

/// A two-step job definition: one `child_jobs`-strategy collector step
/// followed by one `inline`-strategy rating step. Useful as the default
/// fixture for manager/dispatch tests.
pub fn sample_job_definition() -> JobDefinition {
    JobDefinition::new(
        "nightly-ingest",
        vec![
            Step::new("collect", "collector_test_source", serde_json::json!({"source_type": "jira"})),
            Step::new("rate", "rating_composite", serde_json::json!({})),
        ],
        fixed_time(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_job_definition_has_two_steps() {
        assert_eq!(sample_job_definition().step_count(), 2);
    }
}
