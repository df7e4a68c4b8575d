// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{error::EngineError, rpc::RpcResult};

/// One-shot suspend/resume table for synchronous calls (§4.4). A caller
/// suspends under a fresh session id, blocks on the returned receiver, and
/// the built-in resume dispatcher wakes it exactly once when the matching
/// reply frame arrives.
#[derive(Default)]
pub struct SyncTable {
    inner: DashMap<Uuid, oneshot::Sender<RpcResult>>,
}

impl SyncTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending call. Rejects an id already in use: session
    /// ids are caller-generated and must be unique per in-flight call.
    pub fn suspend(&self, id: Uuid) -> Result<oneshot::Receiver<RpcResult>, EngineError> {
        let (tx, rx) = oneshot::channel();
        match self.inner.entry(id) {
            Entry::Occupied(_) => Err(EngineError::DuplicatedSession),
            Entry::Vacant(v) => {
                v.insert(tx);
                Ok(rx)
            },
        }
    }

    /// Wakes the caller suspended under `id`, if any. A resume for an
    /// unknown id (already resumed, or never suspended) is a no-op: late or
    /// duplicate deliveries are simply dropped.
    pub fn resume(&self, id: Uuid, result: RpcResult) {
        if let Some((_, tx)) = self.inner.remove(&id) {
            let _ = tx.send(result);
        }
    }

    /// Drops every pending sender, which unblocks all suspended receivers
    /// with a channel-closed error (the caller maps this to a cancellation).
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
