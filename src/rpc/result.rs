// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::error::EngineError;

/// What a handler invocation produced (§4.2). `is_final` tells the
/// dispatcher chain whether to keep walking (another dispatcher may still
/// want a look) or stop; `payload` is `None` for fire-and-forget handlers
/// and built-in (resume) dispatches, which never produce a reply frame.
#[derive(Debug, Clone, Default)]
pub struct RpcResult {
    pub is_final: bool,
    pub payload: Option<(Vec<u8>, i32)>,
}

impl RpcResult {
    /// A final result carrying an application payload and error code (`0`
    /// for success, any other non-negative value is an application code).
    pub fn final_with(data: Vec<u8>, error_code: i32) -> Self {
        Self { is_final: true, payload: Some((data, error_code)) }
    }

    /// A final, successful result.
    pub fn final_ok(data: Vec<u8>) -> Self {
        Self::final_with(data, 0)
    }

    /// A final result reporting an engine-level failure.
    pub fn final_err(err: EngineError) -> Self {
        Self { is_final: true, payload: Some((Vec::new(), err.wire_code())) }
    }

    /// Claimed by a dispatcher, but deliberately produces no reply frame
    /// (fire-and-forget handlers, the built-in resume dispatcher).
    pub fn final_silent() -> Self {
        Self { is_final: true, payload: None }
    }

    /// Claimed, but yields the frame to the next dispatcher in the chain.
    pub fn not_final() -> Self {
        Self { is_final: false, payload: None }
    }
}
