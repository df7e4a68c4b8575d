// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Illustrative wiring of every engine component into one runnable node.
//! Not part of the engine's public contract (§1): a deployable cluster
//! would add its own CLI, signal handling, and process supervision on top
//! of [`clusterd_rpc`]; this binary exists so the engine can be exercised
//! by hand.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clusterd_rpc::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    cluster::{ClusterView, Status},
    dispatch::{DispatcherChain, RegistryDispatcher, ResumeDispatcher},
    net::{
        ConnectionPool, Direction, InwardClientPool, MulticastReceiver, MulticastSender, NetHandlers,
        RemoteCaller, Target, TcpConnection,
    },
    rpc::{CallContext, FunctionRegistry, RpcResult, Source, TypedHandler},
    session::SessionManager,
    wire::{Frame, Origin},
    workerpool::WorkerPool,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Application function ids. Stable, `>= 0`, chosen once (§4.2); the
/// engine itself only reserves the negative `resume_thread`/`resume_task`
/// ids.
mod fn_ids {
    pub const ANNOUNCE_INNER_NODE: i32 = 1;
    pub const ACCUMULATE: i32 = 2;
    pub const UDP_TEST_RECEIVED: i32 = 3;
}

/// Fire-and-forget: a peer telling this node about another peer it should
/// know about (scenario A). Real membership propagation is out of scope
/// (§1) — this just logs the observation.
async fn announce_inner_node(ip: String, ctx: CallContext) -> RpcResult {
    info!(%ip, source = ?ctx.source, "peer announced an inner node");
    RpcResult::final_silent()
}

/// Sync call target (scenario B): sums the argument list and replies with
/// the stringified total. Spec leaves multi-peer aggregation semantics to
/// the caller's continuation (§9 Open Questions) — this handler itself
/// just answers one call.
async fn accumulate(values: Vec<i64>, _ctx: CallContext) -> RpcResult {
    let total: i64 = values.iter().sum();
    RpcResult::final_ok(total.to_string().into_bytes())
}

/// Multicast fan-out target (scenario C): acknowledges a round number.
async fn udp_test_received(round: u32, ctx: CallContext) -> RpcResult {
    info!(round, source = ?ctx.source, "udp_test_received");
    RpcResult::final_ok(round.to_be_bytes().to_vec())
}

fn build_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            fn_ids::ANNOUNCE_INNER_NODE,
            TypedHandler::<_, (String,)>::new(|ip, ctx| announce_inner_node(ip, ctx)),
        )
        .expect("announce_inner_node registers cleanly");
    registry
        .register(
            fn_ids::ACCUMULATE,
            TypedHandler::<_, (Vec<i64>,)>::new(|values, ctx| accumulate(values, ctx)),
        )
        .expect("accumulate registers cleanly");
    registry
        .register(
            fn_ids::UDP_TEST_RECEIVED,
            TypedHandler::<_, (u32,)>::new(|round, ctx| udp_test_received(round, ctx)),
        )
        .expect("udp_test_received registers cleanly");
    registry
}

/// Every long-lived piece a running node owns. Constructed once in `main`
/// and handed to whichever task needs a reference, instead of the
/// teacher-flagged process-wide singletons (§9 REDESIGN FLAGS).
struct Node {
    cfg: Config,
    sessions: Arc<SessionManager>,
    worker_pool: Arc<WorkerPool>,
    inward_pool: Arc<ConnectionPool>,
    outward_pool: Arc<ConnectionPool>,
    inward_clients: Arc<InwardClientPool>,
    handlers: Arc<NetHandlers>,
    multicast_sender: Arc<MulticastSender>,
    multicast_receiver: Arc<MulticastReceiver>,
    cluster: Arc<ClusterView>,
    status: Arc<Status>,
}

impl Node {
    fn new(cfg: Config) -> Result<Self> {
        let sessions = Arc::new(SessionManager::new());
        let worker_pool = WorkerPool::new(cfg.threads.worker_pool_size);

        let registry = build_registry();
        let chain = Arc::new(DispatcherChain::new(Arc::new(ResumeDispatcher::new(Arc::clone(
            &sessions,
        )))));
        chain.register(Arc::new(RegistryDispatcher::new(Arc::new(registry))));

        let inward_pool = Arc::new(ConnectionPool::new());
        let outward_pool = Arc::new(ConnectionPool::new());
        let cluster = Arc::new(ClusterView::new());
        let status = Arc::new(Status::new());

        let handlers = Arc::new(NetHandlers::new(
            chain,
            Arc::clone(&worker_pool),
            Arc::clone(&inward_pool),
            Arc::clone(&outward_pool),
            Arc::clone(&cluster),
            Arc::clone(&status),
            cfg.network.inward_port,
        ));

        let inward_clients = InwardClientPool::new(cfg.network.inward_port, Arc::clone(&inward_pool));

        let multicast_sender = Arc::new(MulticastSender::bind(
            cfg.network.multicast_group,
            cfg.network.multicast_port,
            cfg.limits.multicast_socket_buf,
        )?);
        let multicast_receiver = Arc::new(MulticastReceiver::bind(
            cfg.network.multicast_group,
            cfg.network.multicast_port,
            cfg.limits.multicast_socket_buf,
            cfg.limits.multicast_datagram_cap,
        )?);

        Ok(Self {
            cfg,
            sessions,
            worker_pool,
            inward_pool,
            outward_pool,
            inward_clients,
            handlers,
            multicast_sender,
            multicast_receiver,
            cluster,
            status,
        })
    }

    fn inward_caller(&self) -> RemoteCaller {
        RemoteCaller::new(
            Origin::Inward,
            Arc::clone(&self.inward_pool),
            Some(Arc::clone(&self.multicast_sender)),
            Arc::clone(&self.sessions),
        )
    }

    async fn serve_outward(self: &Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.cfg.network.outward_port))
            .await
            .context("failed to bind outward TCP surface")?;
        info!(port = self.cfg.network.outward_port, "listening for outward clients");
        self.accept_loop(listener, Direction::Outward).await
    }

    async fn serve_inward(self: &Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.cfg.network.inward_port))
            .await
            .context("failed to bind inward TCP surface")?;
        info!(port = self.cfg.network.inward_port, "listening for inward peers");
        self.accept_loop(listener, Direction::Inward).await
    }

    async fn accept_loop(self: &Arc<Self>, listener: TcpListener, direction: Direction) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await.context("accept failed")?;
            let node = Arc::clone(self);
            let handlers_for_frame = Arc::clone(&self.handlers);
            let handlers_for_disconnect = Arc::clone(&self.handlers);

            let handlers_for_malformed = Arc::clone(&self.handlers);
            let conn = TcpConnection::spawn(
                stream,
                peer,
                move |frame: Frame| {
                    handlers_for_frame.on_frame(frame, direction, Source::Peer(peer));
                },
                move || handlers_for_malformed.on_malformed_frame(),
                move |peer: SocketAddr| {
                    handlers_for_disconnect.on_disconnect(direction, peer);
                },
            );
            node.handlers.on_connect(direction, conn);
        }
    }

    async fn serve_multicast(self: &Arc<Self>) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        let handlers_for_malformed = Arc::clone(&self.handlers);
        let status = Arc::clone(&self.status);
        self.multicast_receiver
            .run(
                move |frame, source| {
                    status.multicast_received.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    handlers.on_frame(frame, Direction::Inward, Source::Multicast(source));
                },
                move || handlers_for_malformed.on_malformed_frame(),
            )
            .await;
        Ok(())
    }

    fn dial_seed_peers(self: &Arc<Self>) {
        let handlers = Arc::clone(&self.handlers);
        for ip in self.cfg.network.seed_peers.clone() {
            let handlers = Arc::clone(&handlers);
            let handlers_for_malformed = Arc::clone(&handlers);
            self.inward_clients.connect(
                ip,
                move |frame, peer| {
                    handlers.on_frame(frame, Direction::Inward, Source::Peer(peer));
                },
                move || handlers_for_malformed.on_malformed_frame(),
            );
        }
    }

    async fn shutdown(&self) {
        self.cluster.begin_shutdown();
        self.multicast_receiver.stop();
        self.multicast_sender.stop().await;
        self.inward_clients.stop().await;
        self.inward_pool.clear();
        self.outward_pool.clear();
        self.sessions.clear();
        self.worker_pool.clear().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::args().nth(1).unwrap_or_else(|| "config/node.yaml".to_string());
    let logger_path =
        std::env::args().nth(2).unwrap_or_else(|| "config/logger.yaml".to_string());

    let _logger_guard = init_logger(&logger_path).context("failed to initialize logging")?;

    let cfg = resolve_config_path(&config_path)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load node config")?;

    let node = Arc::new(Node::new(cfg)?);
    node.dial_seed_peers();

    let outward_node = Arc::clone(&node);
    let inward_node = Arc::clone(&node);
    let multicast_node = Arc::clone(&node);

    let outward_task = tokio::spawn(async move { outward_node.serve_outward().await });
    let inward_task = tokio::spawn(async move { inward_node.serve_inward().await });
    let multicast_task = tokio::spawn(async move { multicast_node.serve_multicast().await });

    // Demonstrate a fire-and-forget call against ourselves, purely so the
    // binary has an observable side effect on a quiet cluster.
    let caller = node.inward_caller();
    if let Err(e) = caller.fire_and_forget(
        fn_ids::ANNOUNCE_INNER_NODE,
        &Target::Random,
        &("127.0.0.1".to_string(),),
    ) {
        warn!("demo announce skipped: {e}");
    }

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl_c")?;
    info!("shutting down");
    node.shutdown().await;

    outward_task.abort();
    inward_task.abort();
    multicast_task.abort();

    Ok(())
}
