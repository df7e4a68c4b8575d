// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario E (§8): a header whose `length` is smaller than the header
//! itself neither dispatches nor crashes the connection; it is counted and
//! the connection keeps serving subsequent, well-formed frames.

use clusterd_rpc::rpc::{CallContext, FunctionRegistry, RpcResult, TypedHandler};
use tokio::io::AsyncWriteExt;

use crate::integration_tests::common::{TestNode, raw_connect};

const PING: i32 = 21;

#[tokio::test]
async fn malformed_header_is_counted_and_connection_survives() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            PING,
            TypedHandler::<_, ()>::new(|_ctx: CallContext| async { RpcResult::final_silent() }),
        )
        .expect("register ping");

    let y = TestNode::start("127.0.0.1:0".parse().unwrap(), 0, registry).await;

    let mut stream = raw_connect(y.addr).await;
    let mut bad = Vec::new();
    bad.extend_from_slice(&8i32.to_ne_bytes());
    bad.extend_from_slice(&[0u8; 40]);
    stream.write_all(&bad).await.expect("write malformed header");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(y.malformed_frames(), 1);

    let header = clusterd_rpc::wire::Header::new(
        PING,
        clusterd_rpc::wire::ReturnMode::AsyncFireAndForget,
        clusterd_rpc::wire::Origin::Inward,
        uuid::Uuid::new_v4(),
        1,
    );
    let good = clusterd_rpc::wire::encode_frame(header, &[]);
    stream.write_all(&good).await.expect("write good frame after malformed one");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The connection must still be live: a second malformed header is
    // counted independently rather than the connection having been torn
    // down after the first.
    let mut bad2 = Vec::new();
    bad2.extend_from_slice(&8i32.to_ne_bytes());
    bad2.extend_from_slice(&[0u8; 40]);
    stream.write_all(&bad2).await.expect("write second malformed header");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(y.malformed_frames(), 2);
}
