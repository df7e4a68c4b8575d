// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario C (§8): a multicast call with `expected = 3` fans in exactly
//! three times, reporting readiness on (and only on) the third.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use clusterd_rpc::{
    net::{MulticastReceiver, MulticastSender, Target},
    rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler},
    session::SessionView,
    wire::Origin,
};

use crate::integration_tests::common::TestNode;

const UDP_TEST_RECEIVED: i32 = 3;
const TEST_GROUP: std::net::Ipv4Addr = std::net::Ipv4Addr::new(239, 255, 9, 9);
const TEST_MC_PORT: u16 = 18181;

#[tokio::test]
async fn three_respondents_fan_in_exactly_once_each() {
    let sender = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, FunctionRegistry::new()).await;

    let mut receivers = Vec::new();
    for _ in 0..3 {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                UDP_TEST_RECEIVED,
                TypedHandler::<_, (u32,)>::new(|round: u32, _ctx: CallContext| async move {
                    RpcResult::final_ok(round.to_be_bytes().to_vec())
                }),
            )
            .expect("register udp_test_received");
        // Every receiver assumes peers reply on the sender's listening port,
        // mirroring a cluster where all nodes share one configured inward
        // port (§3, §4.10).
        let receiver = TestNode::start("127.0.0.1:0".parse().unwrap(), sender.addr.port(), registry).await;
        receiver.dial(sender.addr);
        receivers.push(receiver);
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    for receiver in &receivers {
        let mc = MulticastReceiver::bind(TEST_GROUP, TEST_MC_PORT, 65536, 4096).expect("bind mc receiver");
        let handlers = Arc::clone(&receiver.handlers);
        tokio::spawn(async move {
            mc.run(
                move |frame, source| {
                    handlers.on_frame(
                        frame,
                        clusterd_rpc::net::Direction::Inward,
                        clusterd_rpc::rpc::Source::Multicast(source),
                    );
                },
                || {},
            )
            .await;
        });
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mc_sender = MulticastSender::bind(TEST_GROUP, TEST_MC_PORT, 4096).expect("bind mc sender");
    let caller = clusterd_rpc::net::RemoteCaller::new(
        Origin::Inward,
        Arc::clone(&sender.pool),
        Some(Arc::new(mc_sender)),
        Arc::clone(&sender.sessions),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let ready_at = Arc::new(AtomicUsize::new(0));
    let calls2 = Arc::clone(&calls);
    let ready_at2 = Arc::clone(&ready_at);
    let continuation: clusterd_rpc::session::Continuation =
        Arc::new(move |_payload: Option<Vec<u8>>, _error_code: i32, view: SessionView| {
            let n = calls2.fetch_add(1, Ordering::SeqCst) + 1;
            if view.ready() {
                ready_at2.store(n, Ordering::SeqCst);
            }
        });

    caller
        .call_async(UDP_TEST_RECEIVED, &Target::Multicast { expected_responses: 3 }, &(0u32,), continuation)
        .expect("call_async sends");

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(ready_at.load(Ordering::SeqCst), 3);
    assert_eq!(sender.sessions.pending_async(), 0);
}
