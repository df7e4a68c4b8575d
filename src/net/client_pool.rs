// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The inward TCP client pool (§4.7): owns a set of dial-and-keep-alive
//! clients, one per remote peer, each redialling on disconnect until the
//! enclosing pool is torn down.

use std::{
    net::{IpAddr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{net::TcpStream, sync::Notify, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    net::{connection::TcpConnection, pool::ConnectionPool},
    wire::Frame,
};

const REDIAL_BACKOFF: Duration = Duration::from_millis(500);

struct ClientEntry {
    cancel: CancellationToken,
    /// Distinguishes this dial loop's generation for `ip` from whatever
    /// loop replaces it next, so a loop that is still unwinding after
    /// cancellation never removes a newer entry it didn't create.
    generation: u64,
}

/// Actively dials and maintains a set of inward peers, all bound to the
/// same configured remote port (§4.7). Every operation is dispatched
/// against the same `DashMap`, which plays the role of the teacher's
/// "dedicated control loop": callers never block on dial attempts
/// themselves, they just fire off the redial task and return.
pub struct InwardClientPool {
    port: u16,
    connections: Arc<ConnectionPool>,
    clients: DashMap<IpAddr, ClientEntry>,
    drained: Notify,
    next_generation: AtomicU64,
}

impl InwardClientPool {
    pub fn new(port: u16, connections: Arc<ConnectionPool>) -> Arc<Self> {
        Arc::new(Self {
            port,
            connections,
            clients: DashMap::new(),
            drained: Notify::new(),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Starts dialling `ip` on the configured port. Idempotent: redialling
    /// an `ip` that already has a live (not yet cancelled) entry is a no-op
    /// (call [`InwardClientPool::refresh`] to force a reconnect instead). An
    /// entry that has been cancelled but whose dial loop has not yet
    /// finished unwinding is treated as gone: this starts a fresh loop under
    /// a new generation so the old one's eventual cleanup cannot evict it.
    pub fn connect<F, M>(self: &Arc<Self>, ip: IpAddr, on_frame: F, on_malformed_frame: M)
    where
        F: Fn(Frame, SocketAddr) + Send + Sync + Clone + 'static,
        M: Fn() + Send + Sync + Clone + 'static,
    {
        if let Some(existing) = self.clients.get(&ip) {
            if !existing.cancel.is_cancelled() {
                return;
            }
        }
        let cancel = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.clients.insert(ip, ClientEntry { cancel: cancel.clone(), generation });

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            pool.dial_loop(ip, generation, cancel, on_frame, on_malformed_frame).await;
        });
    }

    async fn dial_loop<F, M>(
        self: Arc<Self>,
        ip: IpAddr,
        generation: u64,
        cancel: CancellationToken,
        on_frame: F,
        on_malformed_frame: M,
    ) where
        F: Fn(Frame, SocketAddr) + Send + Sync + Clone + 'static,
        M: Fn() + Send + Sync + Clone + 'static,
    {
        let addr = SocketAddr::new(ip, self.port);
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let stream = tokio::select! {
                _ = cancel.cancelled() => break,
                result = TcpStream::connect(addr) => result,
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    debug!("dial to inward peer {addr} failed: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(REDIAL_BACKOFF) => continue,
                    }
                },
            };

            info!("connected to inward peer {addr}");
            let connections = Arc::clone(&self.connections);
            let on_frame = on_frame.clone();
            let on_malformed_frame = on_malformed_frame.clone();
            let disconnected = Arc::new(tokio::sync::Notify::new());
            let disconnected2 = Arc::clone(&disconnected);

            let conn = TcpConnection::spawn(
                stream,
                addr,
                move |frame| on_frame(frame, addr),
                move || on_malformed_frame(),
                move |peer| {
                    connections.erase(peer);
                    disconnected2.notify_one();
                },
            );
            self.connections.put(conn);

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.connections.erase(addr);
                    break;
                }
                _ = disconnected.notified() => {}
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        // Only remove the entry if it is still this loop's own generation:
        // a `connect` that raced in after `disconnect` cancelled us already
        // installed a newer entry under the same key, and that one belongs
        // to a loop that is still running.
        self.clients.remove_if(&ip, |_, entry| entry.generation == generation);
        if self.clients.is_empty() {
            self.drained.notify_waiters();
        }
    }

    /// Tears down the entry for `ip`, if any: cancels its dial loop and
    /// evicts its connection from the pool. The map entry itself is left in
    /// place until the dial loop observes the cancellation and removes it,
    /// so callers waiting on drainage (`stop`) see an accurate count of
    /// loops still unwinding rather than one that raced ahead of them.
    pub fn disconnect(&self, ip: IpAddr) {
        if let Some(entry) = self.clients.get(&ip) {
            entry.cancel.cancel();
        }
        self.connections.erase(SocketAddr::new(ip, self.port));
    }

    /// Disconnects then immediately reconnects `ip`.
    pub fn refresh<F, M>(self: &Arc<Self>, ip: IpAddr, on_frame: F, on_malformed_frame: M)
    where
        F: Fn(Frame, SocketAddr) + Send + Sync + Clone + 'static,
        M: Fn() + Send + Sync + Clone + 'static,
    {
        self.disconnect(ip);
        self.connect(ip, on_frame, on_malformed_frame);
    }

    pub fn disconnect_all(&self) {
        let ips: Vec<_> = self.clients.iter().map(|e| *e.key()).collect();
        for ip in ips {
            self.disconnect(ip);
        }
    }

    pub fn refresh_all<F, M>(self: &Arc<Self>, on_frame: F, on_malformed_frame: M)
    where
        F: Fn(Frame, SocketAddr) + Send + Sync + Clone + 'static,
        M: Fn() + Send + Sync + Clone + 'static,
    {
        let ips: Vec<_> = self.clients.iter().map(|e| *e.key()).collect();
        for ip in ips {
            self.refresh(ip, on_frame.clone(), on_malformed_frame.clone());
        }
    }

    /// Graceful shutdown (§4.7): disconnect everything, wait up to 30 s for
    /// the connection pool to drain, then force-clear whatever is left.
    pub async fn stop(&self) {
        self.disconnect_all();

        let deadline = Duration::from_secs(30);
        let wait = async {
            while !self.clients.is_empty() {
                self.drained.notified().await;
            }
        };

        if tokio::time::timeout(deadline, wait).await.is_err() {
            warn!("inward client pool did not drain within 30s; force-clearing remaining clients");
            for entry in self.clients.iter() {
                entry.value().cancel.cancel();
            }
            self.clients.clear();
        }
        self.connections.clear();
    }

    pub fn size(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
