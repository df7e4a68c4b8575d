// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// Snapshot of which peers are currently known, per direction.
#[derive(Debug, Clone, Default)]
pub struct PeerSets {
    pub inward: HashSet<SocketAddr>,
    pub outward: HashSet<SocketAddr>,
}

/// The process-wide view of the cluster (§4.10, §5 shared-resource policy):
/// one mutex guards all mutations; readers take a snapshot rather than hold
/// the lock. `quitting` is the system-wide shutdown flag referenced by §5's
/// cancellation model.
pub struct ClusterView {
    peers: Mutex<PeerSets>,
    quitting: AtomicBool,
}

impl Default for ClusterView {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterView {
    pub fn new() -> Self {
        Self { peers: Mutex::new(PeerSets::default()), quitting: AtomicBool::new(false) }
    }

    pub fn mark_inward_connected(&self, addr: SocketAddr) {
        self.peers.lock().expect("cluster view poisoned").inward.insert(addr);
    }

    pub fn mark_inward_disconnected(&self, addr: SocketAddr) {
        self.peers.lock().expect("cluster view poisoned").inward.remove(&addr);
    }

    pub fn mark_outward_connected(&self, addr: SocketAddr) {
        self.peers.lock().expect("cluster view poisoned").outward.insert(addr);
    }

    pub fn mark_outward_disconnected(&self, addr: SocketAddr) {
        self.peers.lock().expect("cluster view poisoned").outward.remove(&addr);
    }

    pub fn snapshot(&self) -> PeerSets {
        self.peers.lock().expect("cluster view poisoned").clone()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    pub fn begin_shutdown(&self) {
        self.quitting.store(true, Ordering::Release);
    }
}
