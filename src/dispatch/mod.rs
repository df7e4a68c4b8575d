//! The dispatcher chain (§4.3): an ordered list of claimants for each
//! incoming frame, the built-in resume dispatcher always first.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    rpc::{CallContext, FunctionRegistry, RpcResult},
    session::SessionManager,
    wire::{fn_id, header::ReturnMode},
};

pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// What a dispatcher decided about a frame it was offered.
pub enum DispatchOutcome {
    /// This `fn_id` is not mine; try the next dispatcher.
    NotMine,
    /// Mine. If the result is final, the chain stops here.
    Mine(RpcResult),
}

/// One claimant in the dispatcher chain.
pub trait Dispatcher: Send + Sync {
    fn try_dispatch<'a>(
        &'a self,
        fn_id: i32,
        body: &'a [u8],
        ctx: CallContext,
    ) -> BoxFuture<'a, DispatchOutcome>;
}

/// Adapts a [`FunctionRegistry`] into a [`Dispatcher`]: claims exactly the
/// ids it has handlers for.
pub struct RegistryDispatcher {
    registry: Arc<FunctionRegistry>,
}

impl RegistryDispatcher {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }
}

impl Dispatcher for RegistryDispatcher {
    fn try_dispatch<'a>(
        &'a self,
        fn_id: i32,
        body: &'a [u8],
        ctx: CallContext,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(async move {
            match self.registry.get(fn_id) {
                Some(handler) => {
                    let result = handler.call(Bytes::copy_from_slice(body), ctx).await;
                    DispatchOutcome::Mine(result)
                },
                None => DispatchOutcome::NotMine,
            }
        })
    }
}

/// The body of a `resume_thread`/`resume_task` reply frame: the originating
/// session id plus the application payload and error code.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResumeBody {
    pub session_id: [u8; 16],
    pub error_code: i32,
    pub data: Vec<u8>,
}

/// Claims the two reserved, negative `fn_id`s and resumes the matching
/// session. Always the first dispatcher in the chain (§4.3); application
/// `fn_id`s are never negative, so there is no ambiguity with
/// [`RegistryDispatcher`].
pub struct ResumeDispatcher {
    sessions: Arc<SessionManager>,
}

impl ResumeDispatcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

impl Dispatcher for ResumeDispatcher {
    fn try_dispatch<'a>(
        &'a self,
        fn_id: i32,
        body: &'a [u8],
        _ctx: CallContext,
    ) -> BoxFuture<'a, DispatchOutcome> {
        Box::pin(async move {
            if fn_id != fn_id::RESUME_THREAD && fn_id != fn_id::RESUME_TASK {
                return DispatchOutcome::NotMine;
            }
            let Ok(resume) = bincode::deserialize::<ResumeBody>(body) else {
                debug!("malformed resume frame for fn_id {fn_id}");
                return DispatchOutcome::Mine(RpcResult::final_silent());
            };
            let session_id = Uuid::from_bytes(resume.session_id);
            let payload = if resume.data.is_empty() { None } else { Some(resume.data) };

            if fn_id == fn_id::RESUME_THREAD {
                let result = if resume.error_code == 0 {
                    RpcResult::final_ok(payload.unwrap_or_default())
                } else {
                    RpcResult::final_with(payload.unwrap_or_default(), resume.error_code)
                };
                self.sessions.resume_thread(session_id, result);
            } else {
                self.sessions.resume_task(session_id, payload, resume.error_code).await;
            }
            DispatchOutcome::Mine(RpcResult::final_silent())
        })
    }
}

/// Ordered list of dispatchers. The built-in resume dispatcher occupies
/// index 0 forever; additional dispatchers (effectively, just the registry
/// dispatcher in this crate) are inserted right after it, newest first
/// (§4.3's LIFO registration order).
pub struct DispatcherChain {
    dispatchers: Mutex<Vec<Arc<dyn Dispatcher>>>,
}

impl DispatcherChain {
    pub fn new(builtin: Arc<dyn Dispatcher>) -> Self {
        Self { dispatchers: Mutex::new(vec![builtin]) }
    }

    pub fn register(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatchers.lock().expect("dispatcher chain poisoned").insert(1, dispatcher);
    }

    /// Walks the chain in order, stopping at the first dispatcher that
    /// claims the id with a final result. Returns `None` if no dispatcher
    /// claims it at all; callers log that at DEBUG and drop the frame.
    pub async fn dispatch(&self, fn_id: i32, body: &[u8], ctx: CallContext) -> Option<RpcResult> {
        let snapshot: Vec<_> = self.dispatchers.lock().expect("dispatcher chain poisoned").clone();
        for dispatcher in &snapshot {
            match dispatcher.try_dispatch(fn_id, body, ctx).await {
                DispatchOutcome::NotMine => continue,
                DispatchOutcome::Mine(result) if result.is_final => return Some(result),
                DispatchOutcome::Mine(_) => continue,
            }
        }
        debug!("no dispatcher claimed fn_id {fn_id}; dropping frame");
        None
    }
}

/// Builds the reply frame's body for a sync/async-with-callback call whose
/// dispatch produced `result`, per §4.3's "after a non-null final result"
/// rule.
pub fn reply_fn_id(return_mode: ReturnMode) -> Option<i32> {
    match return_mode {
        ReturnMode::Sync => Some(fn_id::RESUME_THREAD),
        ReturnMode::AsyncWithCallback => Some(fn_id::RESUME_TASK),
        ReturnMode::AsyncFireAndForget => None,
    }
}

pub fn encode_resume_body(session_id: Uuid, payload: &Option<(Vec<u8>, i32)>) -> Vec<u8> {
    let (data, error_code) = payload.clone().unwrap_or_default();
    let body = ResumeBody { session_id: *session_id.as_bytes(), error_code, data };
    bincode::serialize(&body).unwrap_or_default()
}
