// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario B (§8): a sync call over TCP unblocks the caller with exactly
//! the callee's reply payload.

use clusterd_rpc::{
    net::Target,
    rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler},
};

use crate::integration_tests::common::TestNode;

const ACCUMULATE: i32 = 2;

#[tokio::test]
async fn accumulate_returns_the_sum_as_a_string() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            ACCUMULATE,
            TypedHandler::<_, (Vec<i64>,)>::new(|values: Vec<i64>, _ctx: CallContext| async move {
                let total: i64 = values.iter().sum();
                RpcResult::final_ok(total.to_string().into_bytes())
            }),
        )
        .expect("register accumulate");

    let y = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, registry).await;
    let x = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, FunctionRegistry::new()).await;
    x.dial(y.addr);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let caller = x.caller();
    let result = caller
        .call_sync(
            ACCUMULATE,
            &Target::Peer(y.addr),
            &(vec![1i64, 2, 3, 4],),
            std::time::Duration::from_secs(2),
        )
        .await
        .expect("sync call completes");

    let (data, error_code) = result.payload.expect("sync call carries a payload");
    assert_eq!(error_code, 0);
    assert_eq!(data, b"10".to_vec());
    assert_eq!(x.sessions.pending_sync(), 0);
}
