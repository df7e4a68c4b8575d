// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt,
    net::SocketAddr,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
};

use anyhow::{Result, bail};
use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::wire::{Frame, try_parse};

/// A point-to-point, ordered transport a connection pool can hold (§4.6).
/// `TcpConnection` is the only implementation this crate ships; the trait
/// exists so pools and callers are not hard-wired to TCP, mirroring how the
/// teacher kept session/connection state behind a pool abstraction.
pub trait Connection: Send + Sync + fmt::Debug {
    fn peer(&self) -> SocketAddr;
    fn connected(&self) -> bool;
    fn send(&self, bytes: Bytes) -> Result<()>;
    fn shutdown(&self);
}

/// One live TCP connection, in either direction. A writer task owns the
/// socket's write half and drains an mpsc queue so `send` never blocks the
/// caller; a reader task owns the read half and feeds the byte stream
/// through [`crate::wire::try_parse`], invoking `on_frame` for each
/// complete frame.
pub struct TcpConnection {
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Bytes>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConnection")
            .field("peer", &self.peer)
            .field("connected", &self.connected())
            .finish()
    }
}

impl Connection for TcpConnection {
    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, bytes: Bytes) -> Result<()> {
        if !self.connected() {
            bail!("connection to {} is no longer live", self.peer);
        }
        self.tx.send(bytes).map_err(|_| anyhow::anyhow!("writer task for {} has exited", self.peer))
    }

    fn shutdown(&self) {
        self.connected.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}

impl TcpConnection {
    /// Splits `stream`, spawns the writer and reader tasks, and returns the
    /// live handle. `on_frame` runs for every frame the reader parses;
    /// `on_disconnect` runs once, when the reader loop exits for any reason
    /// (clean EOF, I/O error, or explicit shutdown).
    pub fn spawn<F, M, D>(
        stream: TcpStream,
        peer: SocketAddr,
        on_frame: F,
        on_malformed_frame: M,
        on_disconnect: D,
    ) -> Arc<Self>
    where
        F: Fn(Frame) + Send + Sync + 'static,
        M: Fn() + Send + Sync + 'static,
        D: FnOnce(SocketAddr) + Send + 'static,
    {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let conn = Arc::new(Self { peer, tx, connected: Arc::clone(&connected), cancel: cancel.clone() });

        tokio::spawn(Self::writer_loop(write_half, rx, cancel.clone()));
        tokio::spawn(Self::reader_loop(
            read_half,
            peer,
            connected,
            cancel,
            on_frame,
            on_malformed_frame,
            on_disconnect,
        ));

        conn
    }

    async fn writer_loop(
        mut writer: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Bytes>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(e) = writer.write_all(&frame).await {
                        warn!("write to peer failed: {e}");
                        break;
                    }
                }
            }
        }
        let _ = writer.shutdown().await;
    }

    async fn reader_loop<F, M, D>(
        mut reader: OwnedReadHalf,
        peer: SocketAddr,
        connected: Arc<AtomicBool>,
        cancel: CancellationToken,
        on_frame: F,
        on_malformed_frame: M,
        on_disconnect: D,
    ) where
        F: Fn(Frame) + Send + Sync + 'static,
        M: Fn() + Send + Sync + 'static,
        D: FnOnce(SocketAddr) + Send + 'static,
    {
        let mut buf = BytesMut::with_capacity(8 * 1024);
        let mut scratch = [0u8; 4096];

        loop {
            loop {
                match try_parse(&mut buf) {
                    Ok(Some(frame)) => on_frame(frame),
                    Ok(None) => break,
                    Err(e) => {
                        // The length prefix itself is untrustworthy, so there is
                        // no safe resync point inside `buf` (§8.4 scenario E):
                        // drop everything buffered and wait for a fresh frame
                        // rather than tearing down the connection.
                        debug!("malformed frame from {peer} ({e}); discarding buffered bytes");
                        on_malformed_frame();
                        buf.clear();
                        break;
                    },
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                read = reader.read(&mut scratch) => {
                    match read {
                        Ok(0) => break,
                        Ok(n) => buf.extend_from_slice(&scratch[..n]),
                        Err(e) => {
                            debug!("read from {peer} failed: {e}");
                            break;
                        }
                    }
                }
            }
        }

        connected.store(false, Ordering::Release);
        on_disconnect(peer);
    }
}
