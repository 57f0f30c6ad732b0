// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::config_entry::{normalize, KeyValuePair};
use sift_core::Event;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::KeyUpdated { key_name, new_value, occurred_at, .. } => {
            let key = normalize(key_name);
            match state.config.get_mut(&key) {
                Some(existing) => {
                    existing.value = new_value.clone();
                    existing.updated_at = *occurred_at;
                }
                None => {
                    state.config.insert(key.clone(), KeyValuePair::new(&key, new_value.clone(), "", *occurred_at));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn repeated_update_is_idempotent_and_keeps_created_at() {
        let mut state = MaterializedState::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);

        apply(&mut state, &Event::KeyUpdated {
            key_name: "  Api.Token  ".into(),
            old_value: None,
            new_value: "v1".into(),
            is_new: true,
            occurred_at: t0,
        });
        apply(&mut state, &Event::KeyUpdated {
            key_name: "api.token".into(),
            old_value: Some("v1".into()),
            new_value: "v2".into(),
            is_new: false,
            occurred_at: t1,
        });

        let entry = state.config.get("api.token").unwrap();
        assert_eq!(entry.value, "v2");
        assert_eq!(entry.created_at, t0);
        assert_eq!(entry.updated_at, t1);
        assert_eq!(state.config.len(), 1);
    }
}
