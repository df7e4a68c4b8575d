// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::EngineError;

/// A snapshot handed to a continuation on every resume, so it can decide
/// whether the fan-in is complete without reaching back into the table.
#[derive(Debug, Clone, Copy)]
pub struct SessionView {
    pub id: Uuid,
    pub expected: i32,
    pub received: i32,
}

impl SessionView {
    /// `true` once every expected response has arrived. The source this
    /// engine is modeled on compared `response_received == response_received`
    /// here, a self-comparison that always holds; the intent was plainly
    /// `received == expected`, which is what this implements (§9).
    pub fn ready(&self) -> bool {
        self.received == self.expected
    }
}

/// Invoked once per resume, with the response payload (if any), its
/// application error code, and the session's fan-in state.
pub type Continuation = Arc<dyn Fn(Option<Vec<u8>>, i32, SessionView) + Send + Sync>;

struct AsyncEntry {
    continuation: Continuation,
    expected: i32,
    received: i32,
    aggregated: Vec<Vec<u8>>,
    /// Set under the entry lock the instant `received` reaches `expected`.
    /// Checked before any further increment so a resume racing the
    /// completing one — both having cloned the entry `Arc` before either
    /// removed it from `inner` — is guaranteed to see completion and no-op,
    /// rather than incrementing `received` past `expected`.
    done: bool,
}

/// Multi-shot suspend/resume table for asynchronous, possibly fan-in calls
/// (§4.4). `expected` is fixed at suspend time (multicast callers know how
/// many peers they addressed); every resume up to that count invokes the
/// continuation, and the entry is removed once the count is reached so late
/// or duplicate deliveries are silently dropped.
#[derive(Default)]
pub struct AsyncTable {
    inner: DashMap<Uuid, Arc<AsyncMutex<AsyncEntry>>>,
}

impl AsyncTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(
        &self,
        id: Uuid,
        continuation: Continuation,
        expected: i32,
    ) -> Result<(), EngineError> {
        match self.inner.entry(id) {
            Entry::Occupied(_) => Err(EngineError::DuplicatedSession),
            Entry::Vacant(v) => {
                v.insert(Arc::new(AsyncMutex::new(AsyncEntry {
                    continuation,
                    expected,
                    received: 0,
                    aggregated: Vec::new(),
                    done: false,
                })));
                Ok(())
            },
        }
    }

    /// Accounts one response for `id` and invokes its continuation. The
    /// table lock is held only long enough to find the entry; the per-entry
    /// lock then serializes invocations for that session without blocking
    /// unrelated sessions, and is dropped before any removal so the
    /// continuation never runs while holding a lock the engine needs
    /// elsewhere.
    ///
    /// Two concurrent resumes for the same session both clone the entry
    /// `Arc` before either can remove it from `inner` — multicast delivery
    /// may duplicate a response, and dispatch runs across worker-pool
    /// threads. The per-entry `done` flag, read and set under the same lock
    /// that guards `received`, makes "has this session already completed"
    /// part of the serialized state instead of a separate check against
    /// `inner`, so a resume that loses the race sees `done` and no-ops
    /// rather than incrementing past `expected` or re-invoking the
    /// continuation.
    pub async fn resume(&self, id: Uuid, payload: Option<Vec<u8>>, error_code: i32) {
        let Some(entry_arc) = self.inner.get(&id).map(|e| Arc::clone(e.value())) else {
            return;
        };

        let mut entry = entry_arc.lock().await;
        if entry.done {
            return;
        }
        entry.received += 1;
        if let Some(ref p) = payload {
            entry.aggregated.push(p.clone());
        }
        let view = SessionView { id, expected: entry.expected, received: entry.received };
        let just_completed = view.ready();
        if just_completed {
            entry.done = true;
        }
        (entry.continuation)(payload, error_code, view);
        drop(entry);

        if just_completed {
            self.inner.remove(&id);
        }
    }

    /// Removes a pending entry without invoking its continuation. Used when
    /// the send that was supposed to reach a callee never left this process
    /// (register-before-send: a suspend with no matching send must not
    /// linger forever waiting for a reply nobody will produce).
    pub fn cancel(&self, id: Uuid) {
        self.inner.remove(&id);
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
