// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::Event;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ConnectorSaved { connector } => {
            state.connectors.insert(connector.id.clone(), connector.clone());
        }
        Event::ConnectorDeleted { id, .. } => {
            state.connectors.remove(id);
        }
        _ => {}
    }
}
