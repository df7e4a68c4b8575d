// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario A (§8): a fire-and-forget call never blocks the caller and
//! delivers its argument to the callee's handler exactly once.

use std::sync::{Arc, Mutex};

use clusterd_rpc::{
    net::Target,
    rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler},
};

use crate::integration_tests::common::TestNode;

const ANNOUNCE_INNER_NODE: i32 = 1;

#[tokio::test]
async fn announce_delivers_the_argument_without_blocking_the_caller() {
    let observed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let observed2 = Arc::clone(&observed);

    let mut registry = FunctionRegistry::new();
    registry
        .register(
            ANNOUNCE_INNER_NODE,
            TypedHandler::<_, (String,)>::new(move |ip: String, _ctx: CallContext| {
                let observed = Arc::clone(&observed2);
                async move {
                    observed.lock().expect("observed lock").push(ip);
                    RpcResult::final_silent()
                }
            }),
        )
        .expect("register announce_inner_node");

    let y = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, registry).await;
    let x = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, FunctionRegistry::new()).await;
    x.dial(y.addr);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let caller = x.caller();
    let started = tokio::time::Instant::now();
    caller
        .fire_and_forget(ANNOUNCE_INNER_NODE, &Target::Peer(y.addr), &("10.0.0.7".to_string(),))
        .expect("fire_and_forget sends");
    assert!(started.elapsed() < std::time::Duration::from_millis(20));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(*observed.lock().expect("observed lock"), vec!["10.0.0.7".to_string()]);
    assert_eq!(x.sessions.pending_sync(), 0);
    assert_eq!(x.sessions.pending_async(), 0);
}
