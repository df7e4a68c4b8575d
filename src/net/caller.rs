// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Remote-caller facades (§4.9): build a frame, register a session if the
//! call style needs one, then send it over whichever transport the target
//! selects. Four transport variants times three call styles share one
//! build-frame/register-session/send skeleton; "broadcast" is named in the
//! spec as reserved and is not implemented here.

use std::{net::SocketAddr, time::Duration};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::EngineError,
    net::{multicast::MulticastSender, pool::ConnectionPool},
    rpc::RpcResult,
    session::{Continuation, SessionManager},
    wire::{Header, Origin, ReturnMode, encode_frame},
};

/// Which peer(s) a call should reach.
pub enum Target {
    /// A specific peer, addressed by `ip:port`.
    Peer(SocketAddr),
    /// Any one live peer in the pool, chosen at random.
    Random,
    /// Every peer reachable on the multicast group, fanning in up to
    /// `expected_responses` replies.
    Multicast { expected_responses: i32 },
}

/// Builds and sends calls on behalf of this node, over either the inward or
/// outward connection pool plus the shared multicast sender. One instance
/// per direction is typical: an inward caller for node-to-node calls, an
/// outward caller for anything a node pushes back to external clients.
pub struct RemoteCaller {
    origin: Origin,
    pool: std::sync::Arc<ConnectionPool>,
    multicast: Option<std::sync::Arc<MulticastSender>>,
    sessions: std::sync::Arc<SessionManager>,
}

impl RemoteCaller {
    pub fn new(
        origin: Origin,
        pool: std::sync::Arc<ConnectionPool>,
        multicast: Option<std::sync::Arc<MulticastSender>>,
        sessions: std::sync::Arc<SessionManager>,
    ) -> Self {
        Self { origin, pool, multicast, sessions }
    }

    fn encode<A: Serialize>(
        &self,
        fn_id: i32,
        return_mode: ReturnMode,
        session_id: Uuid,
        expected_responses: i32,
        args: &A,
    ) -> Result<bytes::Bytes, EngineError> {
        let body = bincode::serialize(args).map_err(|_| EngineError::BadRequest)?;
        let header = Header::new(fn_id, return_mode, self.origin, session_id, expected_responses);
        Ok(encode_frame(header, &body))
    }

    /// Fire-and-forget: no session is created, the caller never blocks
    /// (§4.9). Errors here mean the frame never left the process (no
    /// connection, bad encode); the callee is never aware either way.
    pub fn fire_and_forget<A: Serialize>(
        &self,
        fn_id: i32,
        target: &Target,
        args: &A,
    ) -> Result<(), EngineError> {
        let session_id = Uuid::new_v4();
        let expected = expected_for(target);
        let frame = self.encode(fn_id, ReturnMode::AsyncFireAndForget, session_id, expected, args)?;
        self.send(target, frame)
    }

    /// Registers `continuation` before sending; every matching resume (one
    /// per multicast respondent, at most once for a point-to-point call)
    /// invokes it until the fan-in completes (§4.4, §4.9).
    pub fn call_async<A: Serialize>(
        &self,
        fn_id: i32,
        target: &Target,
        args: &A,
        continuation: Continuation,
    ) -> Result<(), EngineError> {
        let session_id = Uuid::new_v4();
        let expected = expected_for(target);
        let frame = self.encode(fn_id, ReturnMode::AsyncWithCallback, session_id, expected, args)?;
        self.sessions.suspend_async_with(session_id, continuation, expected, || {
            self.send(target, frame.clone())
        })
    }

    /// Blocks the calling task until a matching resume arrives or
    /// `timeout` elapses (§4.4, §4.9). For a multicast target with
    /// `expected_responses > 1` this resolves on the *first* reply, same
    /// as any other sync call; callers that want full fan-in should use
    /// [`RemoteCaller::call_async`] instead.
    pub async fn call_sync<A: Serialize>(
        &self,
        fn_id: i32,
        target: &Target,
        args: &A,
        timeout: Duration,
    ) -> Result<RpcResult, EngineError> {
        let session_id = Uuid::new_v4();
        let expected = expected_for(target);
        let frame = self.encode(fn_id, ReturnMode::Sync, session_id, expected, args)?;
        self.sessions
            .call_sync_with(session_id, timeout, || self.send(target, frame.clone()))
            .await
    }

    fn send(&self, target: &Target, frame: bytes::Bytes) -> Result<(), EngineError> {
        match target {
            Target::Peer(addr) => {
                let conn = self.pool.take(*addr).ok_or(EngineError::BadConnection)?;
                conn.send(frame).map_err(|_| EngineError::BadConnection)
            },
            Target::Random => {
                let conn = self.pool.random_take().ok_or(EngineError::BadConnection)?;
                conn.send(frame).map_err(|_| EngineError::BadConnection)
            },
            Target::Multicast { .. } => {
                let sender = self.multicast.as_ref().ok_or(EngineError::BadConnection)?;
                let sender = std::sync::Arc::clone(sender);
                // `send` is async; the facades above call us from a
                // non-async closure (register-before-send must stay
                // synchronous so it can run between suspend and await), so
                // hand the datagram to a background task instead of
                // blocking here. Multicast is best-effort in this engine
                // regardless (§5), so losing the send outcome is within
                // contract.
                tokio::spawn(async move {
                    if let Err(e) = sender.send(frame).await {
                        tracing::warn!("multicast send failed: {e}");
                    }
                });
                Ok(())
            },
        }
    }
}

fn expected_for(target: &Target) -> i32 {
    match target {
        Target::Peer(_) | Target::Random => 1,
        Target::Multicast { expected_responses } => (*expected_responses).max(1),
    }
}
