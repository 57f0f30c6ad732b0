// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process event bus (§4.F).
//!
//! `subscribe` registers a handler against an event type; `publish_sync`
//! runs every handler for that type serially on the caller's task and
//! returns the first error; `publish` spawns each handler onto the Tokio
//! runtime and does not wait for completion. Unknown types simply have no
//! subscribers — that is not an error.

use crate::event::Event;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("handler for {event_type} failed: {message}")]
    HandlerFailed { event_type: String, message: String },
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// A short name for logging; distinct from the event type, since one
    /// handler may subscribe to several.
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> Result<(), BusError>;
}

#[derive(Default)]
pub struct Bus {
    handlers: RwLock<HashMap<&'static str, Vec<Arc<dyn Handler>>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event_type: &'static str, handler: Arc<dyn Handler>) {
        self.handlers.write().entry(event_type).or_default().push(handler);
    }

    fn subscribers_for(&self, event_type: &str) -> Vec<Arc<dyn Handler>> {
        self.handlers.read().get(event_type).cloned().unwrap_or_default()
    }

    /// Invoke every subscriber for `event.name()` in registration order, on
    /// the caller's task. Returns the first error encountered; subsequent
    /// handlers for this call are not run.
    pub async fn publish_sync(&self, event: &Event) -> Result<(), BusError> {
        for handler in self.subscribers_for(event.name()) {
            handler.handle(event).await.map_err(|e| {
                warn!(event_type = event.name(), handler = handler.name(), error = %e, "handler failed");
                e
            })?;
        }
        Ok(())
    }

    /// Spawn every subscriber concurrently and return immediately. Failures
    /// are logged and never propagate to the publisher (§7 propagation
    /// rule: event-publish failures never fail the originating operation).
    pub fn publish(&self, event: Event) {
        let handlers = self.subscribers_for(event.name());
        if handlers.is_empty() {
            return;
        }
        let event = Arc::new(event);
        for handler in handlers {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(&event).await {
                    warn!(event_type = event.name(), handler = handler.name(), error = %e, "async handler failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        fn name(&self) -> &str {
            "counting_handler"
        }

        async fn handle(&self, _event: &Event) -> Result<(), BusError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BusError::HandlerFailed {
                    event_type: "collection_triggered".into(),
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event::CollectionTriggered {
            job_id: JobId::from_string("job_1"),
            source_id: "PROJ-1".into(),
            source_type: "jira".into(),
            occurred_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_sync_runs_handlers_and_returns_first_error() {
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "collection_triggered",
            Arc::new(CountingHandler { count: count.clone(), fail: true }),
        );
        bus.subscribe(
            "collection_triggered",
            Arc::new(CountingHandler { count: count.clone(), fail: false }),
        );

        let result = bus.publish_sync(&sample_event()).await;
        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1, "second handler must not run after the first fails");
    }

    #[tokio::test]
    async fn publish_to_unknown_type_is_not_an_error() {
        let bus = Bus::new();
        bus.publish(sample_event());
    }

    #[tokio::test]
    async fn publish_runs_handlers_concurrently_without_blocking() {
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "collection_triggered",
            Arc::new(CountingHandler { count: count.clone(), fail: false }),
        );
        bus.publish(sample_event());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
