// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The embedded K/V store adapter (§4.A): a generic filter/sort DSL
//! evaluated against `serde_json::Value` projections, plus the
//! WAL+state transaction primitive every facade builds on.

use crate::state::MaterializedState;
use crate::wal::Wal;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use sift_core::Event;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single predicate over a named field of a record's JSON projection.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Gt(String, Value),
    IsNil(String),
    /// Matches when the field, rendered as a string, matches `pattern`.
    Regexp(String, String),
}

impl Filter {
    fn matches(&self, projection: &Value) -> bool {
        match self {
            Filter::Eq(field, want) => field_value(projection, field).as_ref() == Some(want),
            Filter::Ne(field, want) => field_value(projection, field).as_ref() != Some(want),
            Filter::Lt(field, want) => compare(projection, field, want).map(|o| o.is_lt()).unwrap_or(false),
            Filter::Gt(field, want) => compare(projection, field, want).map(|o| o.is_gt()).unwrap_or(false),
            Filter::IsNil(field) => matches!(field_value(projection, field), None | Some(Value::Null)),
            Filter::Regexp(field, pattern) => {
                let text = match field_value(projection, field) {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => return false,
                };
                regex::Regex::new(pattern).map(|re| re.is_match(&text)).unwrap_or(false)
            }
        }
    }
}

fn field_value(projection: &Value, field: &str) -> Option<Value> {
    projection.get(field).cloned()
}

fn compare(projection: &Value, field: &str, want: &Value) -> Option<std::cmp::Ordering> {
    let have = field_value(projection, field)?;
    match (have.as_f64(), want.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => have.as_str()?.partial_cmp(want.as_str()?),
    }
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub field: String,
    pub reverse: bool,
}

impl SortSpec {
    pub fn by(field: impl Into<String>) -> Self {
        Self { field: field.into(), reverse: false }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Query options shared by every `find` facade: a filter conjunction, an
/// optional sort, and offset/limit applied after sorting.
#[derive(Debug, Clone, Default)]
pub struct QueryOpts {
    pub filters: Vec<Filter>,
    pub sort: Option<SortSpec>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }

    pub fn sort_by(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Apply `opts` to `items`, projecting each through `Serialize` to
/// evaluate filters/sort, then returning the matching items in their
/// original typed form.
pub fn apply_query<'a, T: Serialize>(items: Vec<&'a T>, opts: &QueryOpts) -> Vec<&'a T> {
    let mut scored: Vec<(&'a T, Value)> = items
        .into_iter()
        .map(|item| {
            let projection = serde_json::to_value(item).unwrap_or(Value::Null);
            (item, projection)
        })
        .filter(|(_, projection)| opts.filters.iter().all(|f| f.matches(projection)))
        .collect();

    if let Some(sort) = &opts.sort {
        scored.sort_by(|(_, a), (_, b)| {
            let ord = field_value(a, &sort.field)
                .and_then(|a| field_value(b, &sort.field).map(|b| (a, b)))
                .and_then(|(a, b)| {
                    a.as_f64()
                        .zip(b.as_f64())
                        .and_then(|(a, b)| a.partial_cmp(&b))
                        .or_else(|| a.as_str().zip(b.as_str()).map(|(a, b)| a.cmp(b)))
                })
                .unwrap_or(std::cmp::Ordering::Equal);
            if sort.reverse {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let skip = opts.skip.unwrap_or(0);
    let items = scored.into_iter().skip(skip).map(|(item, _)| item);
    match opts.limit {
        Some(limit) => items.take(limit).collect(),
        None => items.collect(),
    }
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
}

/// The single long-lived shared object every facade and worker holds a
/// handle to. Every write is a WAL append followed by an in-memory
/// `apply_event`, both inside one lock acquisition — the per-key
/// atomicity §4.A mandates. Reads never block writers to unrelated keys
/// any longer than the critical section itself.
pub struct StorageManager {
    inner: Mutex<Inner>,
    log_sequence_counter: AtomicU64,
}

impl StorageManager {
    pub fn new(wal: Wal, state: MaterializedState) -> Self {
        Self { inner: Mutex::new(Inner { state, wal }), log_sequence_counter: AtomicU64::new(0) }
    }

    /// Run `f` against a read-only snapshot reference of the current
    /// state, inside the same lock writers use.
    pub fn with_state<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// The atomic read-modify-write primitive: `f` inspects the current
    /// state and produces the fact to record plus a caller-visible
    /// result (e.g. the new value of a counter). The WAL append and the
    /// state mutation happen under one lock acquisition.
    pub fn transact<R>(&self, f: impl FnOnce(&MaterializedState) -> (Event, R)) -> io::Result<R> {
        let mut inner = self.inner.lock();
        let (event, result) = f(&inner.state);
        inner.wal.append(&event)?;
        if inner.wal.needs_flush() {
            inner.wal.flush()?;
        }
        inner.state.apply_event(&event);
        Ok(result)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().wal.flush()
    }

    /// Next value of the store-wide log sequence counter (§4.E).
    pub fn next_log_sequence(&self) -> u64 {
        self.log_sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Drop one startup-config namespace's persisted history and
    /// in-memory state (§6 `delete_on_startup`). Only meaningful when
    /// called at boot, before anything else has replayed or mutated
    /// the store.
    pub fn wipe_namespace(&self, namespace: &str) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.wal.retain(|event| event.namespace() != Some(namespace))?;
        inner.state.clear_namespace(namespace);
        Ok(())
    }
}
