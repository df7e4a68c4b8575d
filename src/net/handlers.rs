// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Net handlers (§4.10): the glue between reactor callbacks (connect,
//! message, disconnect) and the rest of the engine. Nothing here talks to a
//! socket directly; it only reacts to what [`crate::net::connection`] and
//! [`crate::net::multicast`] report.

use std::{net::SocketAddr, sync::Arc, sync::atomic::Ordering};

use uuid::Uuid;

use crate::{
    cluster::{status::Status, view::ClusterView},
    dispatch::{DispatcherChain, encode_resume_body, reply_fn_id},
    net::pool::ConnectionPool,
    rpc::{CallContext, Source},
    wire::{Frame, Header, Origin, ReturnMode, encode_frame},
    workerpool::WorkerPool,
};

/// Which direction a frame or connection event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inward,
    Outward,
}

impl Direction {
    fn origin(self) -> Origin {
        match self {
            Direction::Inward => Origin::Inward,
            Direction::Outward => Origin::Outward,
        }
    }
}

/// Wires reactor callbacks into the dispatcher chain, the worker pool, and
/// the shared cluster bookkeeping (§4.10). One instance is shared by every
/// accepted/dialled connection on both the inward and outward surfaces.
pub struct NetHandlers {
    dispatcher: Arc<DispatcherChain>,
    worker_pool: Arc<WorkerPool>,
    inward_pool: Arc<ConnectionPool>,
    outward_pool: Arc<ConnectionPool>,
    cluster: Arc<ClusterView>,
    status: Arc<Status>,
    /// The configured inward port, used to reconstruct a reachable
    /// `ip:port` for peers that called in over multicast, where the
    /// datagram's source port is not the peer's listening port (§3, §4.10).
    inward_port: u16,
}

impl NetHandlers {
    pub fn new(
        dispatcher: Arc<DispatcherChain>,
        worker_pool: Arc<WorkerPool>,
        inward_pool: Arc<ConnectionPool>,
        outward_pool: Arc<ConnectionPool>,
        cluster: Arc<ClusterView>,
        status: Arc<Status>,
        inward_port: u16,
    ) -> Self {
        Self { dispatcher, worker_pool, inward_pool, outward_pool, cluster, status, inward_port }
    }

    fn pool_for(&self, direction: Direction) -> &Arc<ConnectionPool> {
        match direction {
            Direction::Inward => &self.inward_pool,
            Direction::Outward => &self.outward_pool,
        }
    }

    /// A new connection was accepted or dialled successfully: index it and
    /// update the cluster view and counters.
    pub fn on_connect(&self, direction: Direction, conn: Arc<dyn crate::net::connection::Connection>) {
        let peer = conn.peer();
        self.pool_for(direction).put(conn);
        match direction {
            Direction::Inward => {
                self.cluster.mark_inward_connected(peer);
                self.status.inward_connections_active.fetch_add(1, Ordering::Relaxed);
            },
            Direction::Outward => {
                self.cluster.mark_outward_connected(peer);
                self.status.outward_connections_active.fetch_add(1, Ordering::Relaxed);
            },
        }
    }

    /// A connection dropped: evict it and update the cluster view and
    /// counters. Callers that also own an [`crate::net::client_pool::InwardClientPool`]
    /// entry for this peer are responsible for erasing that entry too
    /// (§4.7, §4.10); this method only owns the connection-pool side.
    pub fn on_disconnect(&self, direction: Direction, peer: SocketAddr) {
        self.pool_for(direction).erase(peer);
        match direction {
            Direction::Inward => self.cluster.mark_inward_disconnected(peer),
            Direction::Outward => self.cluster.mark_outward_disconnected(peer),
        }
    }

    /// A whole frame arrived over TCP or multicast. Schedules the dispatch
    /// on the worker pool so the reactor/receiver thread it came from is
    /// free immediately (§4.5, §5); any reply frame this call produces is
    /// sent from within that scheduled task, never from here.
    pub fn on_frame(&self, frame: Frame, direction: Direction, source: Source) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let reply_pool = Arc::clone(self.pool_for(direction));
        let status = Arc::clone(&self.status);
        let origin = direction.origin();
        let inward_port = self.inward_port;

        self.worker_pool.schedule(async move {
            let ctx = CallContext::new(origin, frame.header.session_id, source);
            let Some(result) = dispatcher.dispatch(frame.header.fn_id, &frame.body, ctx).await else {
                return;
            };

            let Some(payload) = result.payload.clone() else { return };
            let Some(reply_id) = reply_fn_id(frame.header.return_mode) else { return };

            let reply_peer = reply_target(source, inward_port);
            let Some(conn) = reply_peer.and_then(|addr| reply_pool.take(addr)) else {
                return;
            };

            let body = encode_resume_body(frame.header.session_id, &Some(payload));
            let header = Header::new(reply_id, ReturnMode::AsyncFireAndForget, origin, Uuid::new_v4(), 1);
            let _ = conn.send(encode_frame(header, &body));
        });
    }

    /// Any parse failure on the receive side is logged and the frame is
    /// dropped, never crashes the process (§7); this just records it.
    pub fn on_malformed_frame(&self) {
        self.status.record_malformed_frame();
    }
}

/// Where to send a reply for a frame that arrived from `source`. TCP
/// sources already carry a usable port; multicast sources only carry the
/// sender's IP, so the reply goes to that IP on the configured inward port
/// instead (§3, §4.10).
fn reply_target(source: Source, inward_port: u16) -> Option<SocketAddr> {
    match source {
        Source::Peer(addr) => Some(addr),
        Source::Multicast(addr) => Some(SocketAddr::new(addr.ip(), inward_port)),
    }
}
