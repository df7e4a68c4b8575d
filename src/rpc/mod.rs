//! The function registry and typed handler adapters (§4.2).

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// The trailing, in-process-only argument every handler receives.
pub mod context;
/// The registry mapping `fn_id` to a typed handler.
pub mod registry;
/// What a handler invocation produces.
pub mod result;

pub use context::{CallContext, Source};
pub use registry::{ErasedHandler, FunctionRegistry, TypedHandler};
pub use result::RpcResult;
