// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario D (§8): a sync call whose reply arrives after its timeout sees
//! `connection_time_out`, and the late reply does not fulfil the promise a
//! second time or panic.

use clusterd_rpc::{
    error::EngineError,
    net::Target,
    rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler},
};

use crate::integration_tests::common::TestNode;

const SLOW_ECHO: i32 = 11;

#[tokio::test]
async fn late_reply_is_dropped_after_the_caller_has_timed_out() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            SLOW_ECHO,
            TypedHandler::<_, (u32,)>::new(|n: u32, _ctx: CallContext| async move {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                RpcResult::final_ok(n.to_be_bytes().to_vec())
            }),
        )
        .expect("register slow_echo");

    let y = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, registry).await;
    let x = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, FunctionRegistry::new()).await;
    x.dial(y.addr);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let caller = x.caller();
    let err = caller
        .call_sync(SLOW_ECHO, &Target::Peer(y.addr), &(7u32,), std::time::Duration::from_millis(100))
        .await
        .expect_err("caller times out before the handler replies");
    assert_eq!(err, EngineError::ConnectionTimeOut);
    assert_eq!(x.sessions.pending_sync(), 0);

    // The handler's reply arrives well after the timeout; it must be
    // dropped silently, not delivered to a second waiter.
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert_eq!(x.sessions.pending_sync(), 0);
}
