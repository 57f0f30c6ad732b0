// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::Event;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::DocumentUpserted { document } => {
            state.documents.insert(document.id.clone(), document.clone());
        }
        Event::DocumentDeleted { id, .. } => {
            state.documents.remove(id);
        }
        _ => {}
    }
}
