// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide aggregate of atomic counters (§3, §9 REDESIGN FLAGS): one
/// owned struct in place of the teacher's header-only mutable globals.
#[derive(Default)]
pub struct Status {
    pub multicast_sent: AtomicU64,
    pub multicast_received: AtomicU64,
    pub inward_connections_active: AtomicU64,
    pub inward_connections_failed: AtomicU64,
    pub outward_connections_active: AtomicU64,
    pub outward_connections_failed: AtomicU64,
    pub malformed_frames: AtomicU64,
}

/// A point-in-time, plain-data snapshot of [`Status`], suitable for
/// rendering on the status port or logging.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StatusSnapshot {
    pub multicast_sent: u64,
    pub multicast_received: u64,
    pub inward_connections_active: u64,
    pub inward_connections_failed: u64,
    pub outward_connections_active: u64,
    pub outward_connections_failed: u64,
    pub malformed_frames: u64,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            multicast_sent: self.multicast_sent.load(Ordering::Relaxed),
            multicast_received: self.multicast_received.load(Ordering::Relaxed),
            inward_connections_active: self.inward_connections_active.load(Ordering::Relaxed),
            inward_connections_failed: self.inward_connections_failed.load(Ordering::Relaxed),
            outward_connections_active: self.outward_connections_active.load(Ordering::Relaxed),
            outward_connections_failed: self.outward_connections_failed.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
        }
    }

    pub fn record_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let status = Status::new();
        status.record_malformed_frame();
        status.multicast_sent.fetch_add(3, Ordering::Relaxed);
        let snap = status.snapshot();
        assert_eq!(snap.malformed_frames, 1);
        assert_eq!(snap.multicast_sent, 3);
    }
}
