// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use zerocopy::{FromBytes, IntoBytes};

use crate::{
    error::EngineError,
    wire::header::{HEADER_LEN, Header, RawHeader},
};

/// A fully decoded frame: header plus its archive-serialized body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: Bytes,
}

/// Attempts to pull one whole frame off the front of `buf`.
///
/// Mirrors the teacher's BHS read loop: buffer until `readable >= 4` to learn
/// `length`, then until `readable >= length`. Returns `Ok(None)` ("need more
/// data") without consuming anything from `buf` when the stream is not yet
/// complete. This function is total: fed any byte stream split at arbitrary
/// boundaries, repeated calls deliver exactly the same sequence of frames as
/// feeding the whole stream at once (§8.4).
pub fn try_parse(buf: &mut BytesMut) -> Result<Option<Frame>, EngineError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let length = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if length < 0 || (length as usize) < HEADER_LEN {
        return Err(EngineError::BadRequest);
    }
    let length = length as usize;

    if buf.len() < length {
        return Ok(None);
    }

    let frame_bytes = buf.split_to(length).freeze();
    Ok(Some(frame_from_bytes(frame_bytes)?))
}

/// Decodes a single multicast datagram, which is assumed to be exactly one
/// frame (§4.1). The caller is expected to have read the full datagram
/// already (e.g. via `recv_from` into a fixed-size buffer).
pub fn decode_datagram(datagram: &[u8]) -> Result<Frame, EngineError> {
    if datagram.len() < HEADER_LEN {
        return Err(EngineError::BadRequest);
    }
    let length = i32::from_ne_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
    if length < 0 || length as usize > datagram.len() {
        return Err(EngineError::BadRequest);
    }
    frame_from_bytes(Bytes::copy_from_slice(&datagram[..length as usize]))
}

fn frame_from_bytes(frame_bytes: Bytes) -> Result<Frame, EngineError> {
    if frame_bytes.len() < HEADER_LEN {
        return Err(EngineError::BadRequest);
    }
    let (header_bytes, body) = frame_bytes.split_at(HEADER_LEN);
    let raw: &RawHeader =
        RawHeader::ref_from_bytes(header_bytes).map_err(|_| EngineError::BadRequest)?;
    let header = Header::from_raw(raw)?;
    Ok(Frame {
        header,
        body: frame_bytes.slice_ref(body),
    })
}

/// Builds a frame: a fresh header (with `length` patched in after the body
/// is serialized) followed by the body, mirroring the teacher's
/// builder-then-patch-length approach.
pub fn encode_frame(mut header: Header, body: &[u8]) -> Bytes {
    header.length = HEADER_LEN + body.len();
    let raw = header.to_raw();

    let mut out = BytesMut::with_capacity(header.length);
    out.extend_from_slice(raw.as_bytes());
    out.extend_from_slice(body);
    out.freeze()
}
