// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Property 1 (§8.4): for any registered function's argument tuple `A`,
//! `decode(encode(A))` reproduces `A` bit-for-bit.

use clusterd_rpc::rpc::{CallContext, TypedHandler};
use proptest::prelude::*;

proptest! {
    #[test]
    fn bincode_round_trips_arbitrary_argument_tuples(
        name in ".*",
        values in proptest::collection::vec(any::<i64>(), 0..16),
        round in any::<u32>(),
    ) {
        let args = (name, values, round);
        let encoded = bincode::serialize(&args).expect("encode arbitrary tuple");
        let decoded: (String, Vec<i64>, u32) =
            bincode::deserialize(&encoded).expect("decode what we just encoded");
        prop_assert_eq!(decoded, args);
    }
}

proptest! {
    #[test]
    fn echo_handler_delivers_arbitrary_bytes_unchanged(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let handler = TypedHandler::<_, (Vec<u8>,)>::new(|data: Vec<u8>, _ctx: CallContext| async move {
            clusterd_rpc::rpc::RpcResult::final_ok(data)
        });

        let body = bytes::Bytes::from(bincode::serialize(&(payload.clone(),)).expect("encode payload"));
        let ctx = CallContext::new(
            clusterd_rpc::wire::Origin::Inward,
            uuid::Uuid::new_v4(),
            clusterd_rpc::rpc::Source::Peer("127.0.0.1:9101".parse().expect("valid socket addr")),
        );

        let result = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build a runtime for this one call")
            .block_on(clusterd_rpc::rpc::ErasedHandler::call(&handler, body, ctx));

        let (data, error_code) = result.payload.expect("echo handler always replies");
        prop_assert_eq!(error_code, 0);
        prop_assert_eq!(data, payload);
    }
}
