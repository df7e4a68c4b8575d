//! Wire framing: the request header and the byte-stream framer (§4.1, §6).

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Frame encoding/decoding over a byte stream (TCP) or a single datagram
/// (multicast UDP).
pub mod framing;
/// The packed request header and its enums.
pub mod header;

pub use framing::{Frame, decode_datagram, encode_frame, try_parse};
pub use header::{Header, Origin, RawHeader, ReturnMode, fn_id};
