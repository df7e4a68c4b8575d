// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{
    error::EngineError,
    rpc::RpcResult,
    session::async_table::{AsyncTable, Continuation, SessionView},
    session::sync_table::SyncTable,
};

pub use crate::session::async_table::SessionView as AsyncSessionView;

/// Facade over the sync and async suspend/resume tables (§4.4). This is the
/// only thing the built-in resume dispatcher and the remote-caller facades
/// need to touch; neither has to know the tables exist separately.
#[derive(Default)]
pub struct SessionManager {
    sync_table: SyncTable,
    async_table: AsyncTable,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend_sync(&self, id: Uuid) -> Result<oneshot::Receiver<RpcResult>, EngineError> {
        self.sync_table.suspend(id)
    }

    /// Suspends a sync call and races it against `timeout`. A timeout and a
    /// cancellation via [`SessionManager::clear`] are indistinguishable to
    /// the caller: both surface as [`EngineError::ConnectionTimeOut`].
    pub async fn call_sync(
        &self,
        id: Uuid,
        timeout: Duration,
    ) -> Result<RpcResult, EngineError> {
        let rx = self.suspend_sync(id)?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) | Err(_) => {
                self.sync_table.resume(id, RpcResult::default());
                Err(EngineError::ConnectionTimeOut)
            },
        }
    }

    /// Suspends `id`, then runs `send` to actually get the call frame onto
    /// the wire. If `send` fails the session is cancelled immediately
    /// instead of waiting out the full timeout for a reply that can never
    /// arrive (§4.9's register-before-send, cancel-on-send-failure).
    pub async fn call_sync_with<F>(
        &self,
        id: Uuid,
        timeout: Duration,
        send: F,
    ) -> Result<RpcResult, EngineError>
    where
        F: FnOnce() -> Result<(), EngineError>,
    {
        let rx = self.suspend_sync(id)?;
        if let Err(e) = send() {
            self.sync_table.resume(id, RpcResult::default());
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) | Err(_) => {
                self.sync_table.resume(id, RpcResult::default());
                Err(EngineError::ConnectionTimeOut)
            },
        }
    }

    pub fn suspend_async(
        &self,
        id: Uuid,
        continuation: Continuation,
        expected: i32,
    ) -> Result<(), EngineError> {
        self.async_table.suspend(id, continuation, expected)
    }

    /// Suspends `id` for fan-in, then runs `send`. If `send` fails the
    /// entry is removed immediately rather than left to wait for responses
    /// that were never requested (same register-before-send contract as
    /// [`SessionManager::call_sync_with`]).
    pub fn suspend_async_with<F>(
        &self,
        id: Uuid,
        continuation: Continuation,
        expected: i32,
        send: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<(), EngineError>,
    {
        self.async_table.suspend(id, continuation, expected)?;
        if let Err(e) = send() {
            self.async_table.cancel(id);
            return Err(e);
        }
        Ok(())
    }

    pub fn resume_thread(&self, id: Uuid, result: RpcResult) {
        self.sync_table.resume(id, result);
    }

    pub async fn resume_task(&self, id: Uuid, payload: Option<Vec<u8>>, error_code: i32) {
        self.async_table.resume(id, payload, error_code).await;
    }

    /// Unblocks every pending sync caller and drops every pending async
    /// continuation. Used on shutdown so nothing is left suspended forever.
    pub fn clear(&self) {
        self.sync_table.clear();
        self.async_table.clear();
    }

    pub fn pending_sync(&self) -> usize {
        self.sync_table.len()
    }

    pub fn pending_async(&self) -> usize {
        self.async_table.len()
    }
}

pub type ResumeView = SessionView;
