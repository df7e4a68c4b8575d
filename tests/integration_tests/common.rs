// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared scaffolding for the end-to-end scenario tests (§8): a minimal
//! in-process node, wired the same way `src/bin/node.rs` wires the real
//! thing, but without the config/logger layer the demo binary carries.

use std::{net::SocketAddr, sync::Arc};

use clusterd_rpc::{
    cluster::{ClusterView, Status},
    dispatch::{DispatcherChain, RegistryDispatcher, ResumeDispatcher},
    net::{ConnectionPool, Direction, NetHandlers, RemoteCaller, TcpConnection},
    rpc::{FunctionRegistry, Source},
    session::SessionManager,
    wire::{Frame, Origin},
    workerpool::WorkerPool,
};
use tokio::net::{TcpListener, TcpStream};

/// One in-process node, listening for inward TCP connections on `addr` and
/// dispatching through `registry` plus the built-in resume dispatcher.
pub struct TestNode {
    pub addr: SocketAddr,
    pub pool: Arc<ConnectionPool>,
    pub sessions: Arc<SessionManager>,
    pub status: Arc<Status>,
    pub handlers: Arc<NetHandlers>,
}

impl TestNode {
    /// Binds `bind_addr` and accepts inward connections on it. `reply_port`
    /// is the port this node's handlers assume every peer listens on for
    /// replies to multicast-sourced calls (§3, §4.10) — ordinarily every
    /// node in a cluster shares one configured inward port, so tests that
    /// exercise multicast fan-in pass the sender's listening port here.
    pub async fn start(bind_addr: SocketAddr, reply_port: u16, registry: FunctionRegistry) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let chain =
            Arc::new(DispatcherChain::new(Arc::new(ResumeDispatcher::new(Arc::clone(&sessions)))));
        chain.register(Arc::new(RegistryDispatcher::new(Arc::new(registry))));

        let pool = Arc::new(ConnectionPool::new());
        let outward_pool = Arc::new(ConnectionPool::new());
        let worker_pool = WorkerPool::new(2);
        let cluster = Arc::new(ClusterView::new());
        let status = Arc::new(Status::new());

        let handlers = Arc::new(NetHandlers::new(
            chain,
            worker_pool,
            Arc::clone(&pool),
            outward_pool,
            cluster,
            Arc::clone(&status),
            reply_port,
        ));

        let listener = TcpListener::bind(bind_addr).await.expect("bind test node");
        let addr = listener.local_addr().expect("local addr");

        let accept_handlers = Arc::clone(&handlers);
        tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else { break };
                let on_frame_handlers = Arc::clone(&accept_handlers);
                let on_bad_handlers = Arc::clone(&accept_handlers);
                let on_disc_handlers = Arc::clone(&accept_handlers);
                let conn = TcpConnection::spawn(
                    stream,
                    peer,
                    move |frame: Frame| {
                        on_frame_handlers.on_frame(frame, Direction::Inward, Source::Peer(peer));
                    },
                    move || on_bad_handlers.on_malformed_frame(),
                    move |peer| on_disc_handlers.on_disconnect(Direction::Inward, peer),
                );
                accept_handlers.on_connect(Direction::Inward, conn);
            }
        });

        Self { addr, pool, sessions, status, handlers }
    }

    /// Dials `peer`, wires the connection's frames back through this node's
    /// own handlers, and stores it in this node's pool under `peer`.
    pub fn dial(&self, peer: SocketAddr) -> tokio::task::JoinHandle<()> {
        let pool = Arc::clone(&self.pool);
        let handlers = Arc::clone(&self.handlers);
        let handlers_bad = Arc::clone(&self.handlers);
        let handlers_disc = Arc::clone(&self.handlers);
        tokio::spawn(async move {
            let stream = TcpStream::connect(peer).await.expect("dial peer");
            let conn = TcpConnection::spawn(
                stream,
                peer,
                move |frame: Frame| handlers.on_frame(frame, Direction::Inward, Source::Peer(peer)),
                move || handlers_bad.on_malformed_frame(),
                move |peer| handlers_disc.on_disconnect(Direction::Inward, peer),
            );
            pool.put(conn);
        })
    }

    /// A caller facade over this node's pool and session table, addressing
    /// calls with [`Origin::Inward`].
    pub fn caller(&self) -> RemoteCaller {
        RemoteCaller::new(Origin::Inward, Arc::clone(&self.pool), None, Arc::clone(&self.sessions))
    }

    pub fn malformed_frames(&self) -> u64 {
        self.status.snapshot().malformed_frames
    }
}

/// Opens a raw TCP connection to `addr`, for tests that need to write bytes
/// the engine's own encoder would never produce (malformed headers).
pub async fn raw_connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("raw connect")
}
