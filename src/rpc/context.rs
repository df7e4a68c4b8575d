// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;

use uuid::Uuid;

use crate::wire::Origin;

/// Identifies which collaborator delivered a call, for handlers that need to
/// reply out-of-band (multicast fan-in, auto-replies) instead of through the
/// normal return path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Delivered over a TCP connection from this peer address.
    Peer(SocketAddr),
    /// Delivered as a multicast datagram originating from this address.
    Multicast(SocketAddr),
}

/// The trailing argument every registered handler receives, in addition to
/// its own typed parameters (§4.2). Carried purely in-process: it is never
/// part of the wire-encoded argument tuple, so handlers cannot be tricked
/// into trusting attacker-controlled session/origin data.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub origin: Origin,
    pub session_id: Uuid,
    pub source: Source,
}

impl CallContext {
    pub fn new(origin: Origin, session_id: Uuid, source: Source) -> Self {
        Self { origin, session_id, source }
    }
}
