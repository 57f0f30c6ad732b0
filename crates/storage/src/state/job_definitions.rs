// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::Event;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobDefinitionSaved { definition } => {
            state.job_definitions.insert(definition.id.clone(), definition.clone());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sift_core::{JobDefinition, Step};

    #[test]
    fn save_is_idempotent() {
        let mut state = MaterializedState::new();
        let def = JobDefinition::new("nightly", vec![Step::new("collect", "noop", serde_json::json!({}))], Utc::now());
        apply(&mut state, &Event::JobDefinitionSaved { definition: def.clone() });
        apply(&mut state, &Event::JobDefinitionSaved { definition: def.clone() });
        assert_eq!(state.job_definitions.len(), 1);
        assert_eq!(state.job_definition_by_name("nightly").unwrap().id, def.id);
    }
}
