// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc};

use dashmap::DashMap;
use rand::Rng;

use crate::net::connection::Connection;

/// Holds at most one live connection per peer address (§4.6). Used both for
/// the outward (server-accepted) side and the inward (client-initiated)
/// side; which one a given pool instance represents is a matter of which
/// handlers feed it, not of its own code.
#[derive(Default)]
pub struct ConnectionPool {
    inner: DashMap<SocketAddr, Arc<dyn Connection>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the connection for its peer address.
    pub fn put(&self, conn: Arc<dyn Connection>) {
        self.inner.insert(conn.peer(), conn);
    }

    /// Returns the connection for `addr`, if present and still live.
    pub fn take(&self, addr: SocketAddr) -> Option<Arc<dyn Connection>> {
        self.inner.get(&addr).map(|e| Arc::clone(e.value())).filter(|c| c.connected())
    }

    /// Returns a uniformly-chosen live connection, for callers that just
    /// need "any peer" (§4.9's random-peer fire-and-forget/sync variants).
    pub fn random_take(&self) -> Option<Arc<dyn Connection>> {
        let len = self.inner.len();
        if len == 0 {
            return None;
        }
        let skip = rand::rng().random_range(0..len);
        self.inner
            .iter()
            .skip(skip)
            .map(|e| Arc::clone(e.value()))
            .find(|c| c.connected())
            .or_else(|| self.inner.iter().map(|e| Arc::clone(e.value())).find(|c| c.connected()))
    }

    /// All currently live connections, for broadcast-style fan-out.
    pub fn all_live(&self) -> Vec<Arc<dyn Connection>> {
        self.inner.iter().map(|e| Arc::clone(e.value())).filter(|c| c.connected()).collect()
    }

    pub fn erase(&self, addr: SocketAddr) -> Option<Arc<dyn Connection>> {
        self.inner.remove(&addr).map(|(_, c)| c)
    }

    pub fn size(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        for entry in self.inner.iter() {
            entry.value().shutdown();
        }
        self.inner.clear();
    }
}
