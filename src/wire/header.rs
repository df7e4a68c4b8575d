// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::mem::size_of;

use uuid::Uuid;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::EngineError;

/// Reserved, negative function ids used by the built-in resume dispatcher
/// (§4.3). Application ids MUST be `>= 0`.
pub mod fn_id {
    pub const RESUME_THREAD: i32 = -1;
    pub const RESUME_TASK: i32 = -2;
}

/// How the originating call expects its response delivered, per the
/// `return_mode` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    Sync = 0,
    AsyncWithCallback = 1,
    AsyncFireAndForget = 2,
}

impl TryFrom<i32> for ReturnMode {
    type Error = EngineError;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ReturnMode::Sync),
            1 => Ok(ReturnMode::AsyncWithCallback),
            2 => Ok(ReturnMode::AsyncFireAndForget),
            _ => Err(EngineError::BadRequest),
        }
    }
}

/// Which kind of client a frame originated from. The wire value is a
/// bitmask: `Any` matches both `Outward` and `Inward`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Outward = 1,
    Inward = 2,
    Any = 3,
}

impl Origin {
    /// Whether `self` (typically a handler's declared acceptance mask)
    /// matches a concrete caller origin.
    pub fn accepts(self, caller: Origin) -> bool {
        (self as i32) & (caller as i32) == caller as i32
    }
}

impl TryFrom<i32> for Origin {
    type Error = EngineError;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Origin::Outward),
            2 => Ok(Origin::Inward),
            3 => Ok(Origin::Any),
            _ => Err(EngineError::BadRequest),
        }
    }
}

/// The fixed-width, packed, host-endian record at the start of every frame
/// (§3, §6). No field reordering; memory-copied directly to/from the wire.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawHeader {
    pub length: i32,
    pub fn_id: i32,
    pub return_mode: i32,
    pub origin: i32,
    pub session_id: [u8; 16],
    pub expected_responses: i32,
}

/// Total size of [`RawHeader`] on the wire, in bytes.
pub const HEADER_LEN: usize = size_of::<RawHeader>();

/// A decoded, typed view of [`RawHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: usize,
    pub fn_id: i32,
    pub return_mode: ReturnMode,
    pub origin: Origin,
    pub session_id: Uuid,
    pub expected_responses: i32,
}

impl Header {
    /// Builds a header for an outgoing frame. `length` is patched in by
    /// [`crate::wire::encode_frame`] once the body has been serialized.
    pub fn new(
        fn_id: i32,
        return_mode: ReturnMode,
        origin: Origin,
        session_id: Uuid,
        expected_responses: i32,
    ) -> Self {
        Self {
            length: 0,
            fn_id,
            return_mode,
            origin,
            session_id,
            expected_responses,
        }
    }

    pub fn to_raw(self) -> RawHeader {
        RawHeader {
            length: self.length as i32,
            fn_id: self.fn_id,
            return_mode: self.return_mode as i32,
            origin: self.origin as i32,
            session_id: *self.session_id.as_bytes(),
            expected_responses: self.expected_responses,
        }
    }

    pub fn from_raw(raw: &RawHeader) -> Result<Self, EngineError> {
        if raw.length < 0 || (raw.length as usize) < HEADER_LEN {
            return Err(EngineError::BadRequest);
        }
        if raw.expected_responses < 1 {
            return Err(EngineError::BadRequest);
        }
        Ok(Self {
            length: raw.length as usize,
            fn_id: raw.fn_id,
            return_mode: ReturnMode::try_from(raw.return_mode)?,
            origin: Origin::try_from(raw.origin)?,
            session_id: Uuid::from_bytes(raw.session_id),
            expected_responses: raw.expected_responses,
        })
    }
}
