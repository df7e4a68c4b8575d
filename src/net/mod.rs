//! Connection-pool fabric, transports, and reactor glue (§4.6-§4.10).

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Remote-caller facades: build a frame, register a session, send (§4.9).
pub mod caller;
/// The inward TCP client pool: dial-and-keep-alive peers (§4.7).
pub mod client_pool;
/// The `Connection` trait and its TCP implementation (§4.6).
pub mod connection;
/// Reactor-callback glue: connect/disconnect/frame handlers (§4.10).
pub mod handlers;
/// The multicast sender and receiver (§4.8).
pub mod multicast;
/// Per-direction connection pool, keyed by peer address (§4.6).
pub mod pool;

pub use caller::{RemoteCaller, Target};
pub use client_pool::InwardClientPool;
pub use connection::{Connection, TcpConnection};
pub use handlers::{Direction, NetHandlers};
pub use multicast::{MulticastReceiver, MulticastSender};
pub use pool::ConnectionPool;
