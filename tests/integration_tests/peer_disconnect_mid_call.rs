// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario F (§8): the callee's connection drops before its reply arrives.
//! The caller's connection pool evicts the peer and the sync call times out
//! exactly as it would for an unreachable peer — the caller has no other
//! way to distinguish "the peer vanished" from "the peer is slow".

use std::time::Duration;

use clusterd_rpc::{
    error::EngineError,
    net::Target,
    rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler},
};

use crate::integration_tests::common::TestNode;

const SLOW_ECHO: i32 = 31;

#[tokio::test]
async fn disconnect_before_reply_times_out_the_caller() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            SLOW_ECHO,
            TypedHandler::<_, (u32,)>::new(|n: u32, _ctx: CallContext| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                RpcResult::final_ok(n.to_be_bytes().to_vec())
            }),
        )
        .expect("register slow_echo");

    let y = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, registry).await;
    let x = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, FunctionRegistry::new()).await;
    x.dial(y.addr);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let caller = x.caller();
    let call = caller.call_sync(SLOW_ECHO, &Target::Peer(y.addr), &(5u32,), Duration::from_millis(500));

    // Sever the connection almost immediately, well before the handler
    // would reply.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let conn = x.pool.take(y.addr).expect("connection exists before severing it");
    conn.shutdown();

    let err = call.await.expect_err("caller times out once the connection is gone");
    assert_eq!(err, EngineError::ConnectionTimeOut);
    assert_eq!(x.sessions.pending_sync(), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(x.pool.take(y.addr).is_none(), "the dead connection must have been evicted from the pool");
}
