// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Engine error taxonomy (§7). One numeric space, distinct from application
//! error codes: engine codes are negative, `0` is success, and any
//! non-negative value passes through untouched as an application code.

use thiserror::Error;

/// Errors raised by the engine itself, as opposed to application handlers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("no connection available to the requested peer")]
    BadConnection,
    #[error("frame failed header checks or body decode")]
    BadRequest,
    #[error("resume for an unknown or already-completed session")]
    BadSession,
    #[error("suspend with an already-used session id")]
    DuplicatedSession,
    #[error("sync call exceeded its timeout")]
    ConnectionTimeOut,
    #[error("unknown engine error")]
    Unknown,
}

impl EngineError {
    /// Wire-level encoding used inside `Result.error_code`. Engine codes
    /// occupy the negative range so they can never collide with an
    /// application's own (non-negative, by contract) error codes.
    pub fn wire_code(self) -> i32 {
        match self {
            EngineError::BadConnection => -1,
            EngineError::BadRequest => -2,
            EngineError::BadSession => -3,
            EngineError::DuplicatedSession => -4,
            EngineError::ConnectionTimeOut => -5,
            EngineError::Unknown => -6,
        }
    }

    /// Inverse of [`EngineError::wire_code`]; returns `None` for `0` (success)
    /// or any non-negative application code.
    pub fn from_wire_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(EngineError::BadConnection),
            -2 => Some(EngineError::BadRequest),
            -3 => Some(EngineError::BadSession),
            -4 => Some(EngineError::DuplicatedSession),
            -5 => Some(EngineError::ConnectionTimeOut),
            -6 => Some(EngineError::Unknown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_code_round_trips() {
        for e in [
            EngineError::BadConnection,
            EngineError::BadRequest,
            EngineError::BadSession,
            EngineError::DuplicatedSession,
            EngineError::ConnectionTimeOut,
            EngineError::Unknown,
        ] {
            assert_eq!(EngineError::from_wire_code(e.wire_code()), Some(e));
        }
    }

    #[test]
    fn ok_and_application_codes_do_not_map_to_engine_errors() {
        assert_eq!(EngineError::from_wire_code(0), None);
        assert_eq!(EngineError::from_wire_code(42), None);
    }
}
