//! A fixed-size worker pool draining a FIFO of boxed thunks (§4.5).

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Dispatches incoming work onto a fixed-size pool of tokio tasks, so frame
/// handling never runs on the network reactor's own task (§4.5). `schedule`
/// never blocks; a full queue just grows (bounded only by memory), matching
/// the engine's "accept-now, apply-backpressure-elsewhere" contract.
pub struct WorkerPool {
    queue: Mutex<VecDeque<Task>>,
    notify: Notify,
    running: AtomicUsize,
    idle: Notify,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            running: AtomicUsize::new(0),
            idle: Notify::new(),
            cancel: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        });

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(tokio::spawn(Arc::clone(&pool).run_worker(id)));
        }
        *pool.workers.lock().expect("worker handle list poisoned") = workers;
        pool
    }

    async fn run_worker(self: Arc<Self>, id: usize) {
        loop {
            let task = { self.queue.lock().expect("worker queue poisoned").pop_front() };
            let Some(task) = task else {
                // `CancellationToken::cancelled()` completes immediately once
                // cancelled, even for a future created after the cancel —
                // unlike a bare `Notify::notified()`, there is no window
                // where a shutdown signalled between the empty-queue check
                // and this await is missed (a plain Notify would let `clear`
                // hang forever if that race landed).
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = self.notify.notified() => {},
                }
                continue;
            };

            self.running.fetch_add(1, Ordering::AcqRel);
            task.await;
            if self.running.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.idle.notify_waiters();
            }
        }
        debug!("worker {id} stopped");
    }

    /// Enqueues `fut` for the next free worker. Never blocks the caller.
    pub fn schedule<F>(&self, fut: F)
    where F: Future<Output = ()> + Send + 'static {
        self.queue.lock().expect("worker queue poisoned").push_back(Box::pin(fut));
        self.notify.notify_one();
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().expect("worker queue poisoned").len()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Drops every not-yet-started task, then waits for in-flight tasks to
    /// finish before the workers themselves exit (§4.5).
    pub async fn clear(&self) {
        self.cancel.cancel();
        self.queue.lock().expect("worker queue poisoned").clear();
        self.notify.notify_waiters();

        loop {
            let idle = self.idle.notified();
            if self.running.load(Ordering::Acquire) == 0 {
                break;
            }
            idle.await;
        }

        let handles = std::mem::take(&mut *self.workers.lock().expect("worker handle list poisoned"));
        for handle in handles {
            let _ = handle.await;
        }
    }
}
