// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A peer-to-peer RPC runtime for a small cluster of long-running nodes.
//!
//! A node both serves and issues remote calls over three transports: a
//! multicast UDP group for cluster-wide fan-out, a persistent TCP mesh
//! between cluster nodes ("inward"), and a TCP surface for external
//! clients ("outward"). [`wire`] frames calls; [`rpc`] registers and
//! invokes handlers; [`session`] suspends callers until a response arrives;
//! [`dispatch`] routes a decoded frame to the handler that claims it;
//! [`net`] owns the connection pools, the inward client pool, the
//! multicast endpoint, and the remote-caller facades; [`workerpool`] keeps
//! handler execution off the I/O reactor; [`cluster`] tracks the
//! process-wide peer view and status counters; [`cfg`] loads and validates
//! configuration and installs logging; [`error`] is the engine's own error
//! taxonomy, distinct from application error codes.

/// Configuration, CLI glue, and logging.
pub mod cfg;
/// Process-wide peer view and status counters.
pub mod cluster;
/// The dispatcher chain.
pub mod dispatch;
/// The engine's own error taxonomy.
pub mod error;
/// Connection pools, transports, and reactor glue.
pub mod net;
/// The function registry and typed handler adapters.
pub mod rpc;
/// Sync/async call suspension and fan-in aggregation.
pub mod session;
/// The wire header and byte-stream/datagram framer.
pub mod wire;
/// Off-reactor handler execution.
pub mod workerpool;
