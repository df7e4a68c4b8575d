// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Property 4 (§8.4): the byte-stream framer is total across arbitrary
//! chunk boundaries. Feeding a concatenation of frames one byte at a time
//! (or in any other split) must deliver exactly the same frame sequence as
//! feeding the whole buffer in one call.

use bytes::BytesMut;
use clusterd_rpc::wire::{Header, Origin, ReturnMode, encode_frame, try_parse};
use proptest::prelude::*;
use uuid::Uuid;

fn build_stream(bodies: &[Vec<u8>]) -> (BytesMut, Vec<(i32, Vec<u8>)>) {
    let mut whole = BytesMut::new();
    let mut expected = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        let fn_id = i as i32;
        let header = Header::new(fn_id, ReturnMode::Sync, Origin::Outward, Uuid::new_v4(), 1);
        whole.extend_from_slice(&encode_frame(header, body));
        expected.push((fn_id, body.clone()));
    }
    (whole, expected)
}

proptest! {
    #[test]
    fn arbitrary_split_points_yield_the_same_frames_as_one_shot(
        bodies in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..24),
            0..6,
        ),
        split_sizes in proptest::collection::vec(1usize..5, 1..40),
    ) {
        let (whole, expected) = build_stream(&bodies);

        let mut one_shot = whole.clone();
        let mut one_shot_frames = Vec::new();
        while let Some(frame) = try_parse(&mut one_shot).expect("well-formed frames only") {
            one_shot_frames.push((frame.header.fn_id, frame.body.to_vec()));
        }
        prop_assert_eq!(&one_shot_frames, &expected);

        // Re-feed the same bytes split at arbitrary, test-chosen boundaries.
        let mut fed = BytesMut::new();
        let mut decoded = Vec::new();
        let mut cursor = 0usize;
        let mut split_idx = 0usize;
        while cursor < whole.len() {
            let take = split_sizes[split_idx % split_sizes.len()];
            split_idx += 1;
            let end = (cursor + take).min(whole.len());
            fed.extend_from_slice(&whole[cursor..end]);
            cursor = end;

            while let Some(frame) = try_parse(&mut fed).expect("well-formed frames only") {
                decoded.push((frame.header.fn_id, frame.body.to_vec()));
            }
        }

        prop_assert_eq!(decoded, expected);
        prop_assert!(fed.is_empty());
    }
}
