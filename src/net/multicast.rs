// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The multicast endpoint: a bounded-size UDP sender and receiver joined to
//! a configured group (§4.8). Oversize frames are a caller error here, not
//! something this module tries to fragment or work around — §4.1 is
//! explicit that anything above the datagram cap belongs on TCP.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::{net::UdpSocket, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::wire::{Frame, decode_datagram};

fn bind_socket(bind_addr: SocketAddrV4, recv_buf: usize, send_buf: usize) -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    if recv_buf > 0 {
        socket.set_recv_buffer_size(recv_buf)?;
    }
    if send_buf > 0 {
        socket.set_send_buffer_size(send_buf)?;
    }
    socket.bind(&bind_addr.into())?;
    Ok(socket)
}

/// One UDP socket, pre-resolved to `group:port`, shared by every caller that
/// wants to send a multicast frame (§4.8's sender singleton). Sends are
/// serialized through a mutex that guards the underlying socket handle
/// against a concurrent `stop`; datagram writes themselves are already
/// atomic at the kernel.
pub struct MulticastSender {
    group: SocketAddrV4,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl MulticastSender {
    /// Binds an ephemeral local UDP socket and pre-resolves the multicast
    /// destination. `send_buf` mirrors the 220 KiB default named in §4.8.
    pub fn bind(group: Ipv4Addr, port: u16, send_buf: usize) -> Result<Self> {
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        let std_socket =
            bind_socket(local, 0, send_buf).context("failed to create multicast sender socket")?;
        let socket = UdpSocket::from_std(std_socket.into())
            .context("failed to adopt multicast sender socket into tokio")?;
        Ok(Self {
            group: SocketAddrV4::new(group, port),
            socket: Mutex::new(Some(Arc::new(socket))),
        })
    }

    /// Sends one datagram to the configured group. Returns an error once
    /// [`MulticastSender::stop`] has closed the socket, mirroring the
    /// teacher's "further sends return -1" contract.
    pub async fn send(&self, bytes: Bytes) -> Result<()> {
        if bytes.len() > u16::MAX as usize {
            bail!("multicast datagram of {} bytes exceeds UDP's own limit", bytes.len());
        }
        let socket = {
            let guard = self.socket.lock().await;
            guard.clone().context("multicast sender has been stopped")?
        };
        socket
            .send_to(&bytes, SocketAddr::V4(self.group))
            .await
            .context("multicast send_to failed")?;
        Ok(())
    }

    /// Drops the underlying socket; subsequent `send` calls fail.
    pub async fn stop(&self) {
        self.socket.lock().await.take();
    }
}

/// Joins the configured group on `INADDR_ANY:port` and runs a blocking
/// receive loop on a dedicated task (§4.8). Each datagram is assumed to be
/// exactly one frame; a malformed datagram is logged and the loop
/// continues rather than tearing down the socket.
pub struct MulticastReceiver {
    socket: Arc<UdpSocket>,
    cancel: CancellationToken,
    recv_buf_cap: usize,
}

impl MulticastReceiver {
    pub fn bind(group: Ipv4Addr, port: u16, recv_buf: usize, datagram_cap: usize) -> Result<Self> {
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let std_socket =
            bind_socket(bind_addr, recv_buf, 0).context("failed to create multicast receiver socket")?;
        std_socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("failed to join multicast group {group}"))?;
        let socket = UdpSocket::from_std(std_socket.into())
            .context("failed to adopt multicast receiver socket into tokio")?;
        Ok(Self { socket: Arc::new(socket), cancel: CancellationToken::new(), recv_buf_cap: datagram_cap })
    }

    /// Runs until [`MulticastReceiver::stop`] is called. `on_datagram` is
    /// invoked with the decoded frame and the sender's address for every
    /// well-formed datagram; `on_bad_datagram` for anything that fails to
    /// parse (the teacher's "log and continue", not "crash the process").
    pub async fn run<F, B>(&self, on_datagram: F, on_bad_datagram: B)
    where
        F: Fn(Frame, SocketAddr) + Send + Sync + 'static,
        B: Fn() + Send + Sync + 'static,
    {
        let mut buf = vec![0u8; self.recv_buf_cap];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => match decode_datagram(&buf[..len]) {
                            Ok(frame) => on_datagram(frame, source),
                            Err(e) => {
                                debug!("malformed multicast datagram from {source}: {e}");
                                on_bad_datagram();
                            }
                        },
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => warn!("multicast recv_from failed: {e}"),
                    }
                }
            }
        }
    }

    /// Signals the run loop to exit on its next iteration.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc as StdArc, Mutex as StdMutex},
        time::Duration,
    };

    use uuid::Uuid;

    use super::*;
    use crate::wire::{Header, Origin, ReturnMode, encode_frame};

    // 239.255.0.0/16 is the administratively-scoped range; loopback-local
    // multicast tests stay inside it to avoid leaking onto a real LAN.
    const TEST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 7, 7);

    #[tokio::test]
    async fn sender_after_stop_rejects_sends() {
        let sender = MulticastSender::bind(TEST_GROUP, 17171, 4096).expect("bind sender");
        sender.stop().await;
        let header = Header::new(1, ReturnMode::AsyncFireAndForget, Origin::Inward, Uuid::new_v4(), 1);
        let frame = encode_frame(header, b"x");
        assert!(sender.send(frame).await.is_err());
    }

    #[tokio::test]
    async fn receiver_delivers_datagrams_sent_to_the_group() {
        let port = 17172;
        let receiver =
            MulticastReceiver::bind(TEST_GROUP, port, 65536, 4096).expect("bind receiver");
        let sender = MulticastSender::bind(TEST_GROUP, port, 4096).expect("bind sender");

        let received = StdArc::new(StdMutex::new(Vec::new()));
        let received2 = StdArc::clone(&received);
        let run = tokio::spawn(async move {
            receiver.run(move |frame, _src| received2.lock().unwrap().push(frame.header.fn_id), || {}).await;
        });

        let header = Header::new(42, ReturnMode::AsyncFireAndForget, Origin::Inward, Uuid::new_v4(), 1);
        let frame = encode_frame(header, b"hello");
        // Give the receiver task a moment to reach its recv_from before we
        // send, since this is UDP and nothing retries a missed datagram.
        tokio::time::sleep(Duration::from_millis(30)).await;
        sender.send(frame).await.expect("send");
        tokio::time::sleep(Duration::from_millis(100)).await;

        run.abort();
        assert_eq!(*received.lock().unwrap(), vec![42]);
    }
}
