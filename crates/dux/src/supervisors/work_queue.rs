//! 🧺 WorkQueue: a growable pile of tasks that knows when it's truly empty.
//!
//! 🎬 *[a worker pops a task. the task lists a folder. the folder has 400 children.]*
//! *[the task pushes 400 more tasks before it returns.]*
//! *[the queue looked empty for one microsecond there. it was lying.]*
//!
//! That microsecond is why "the list is empty" is never the finish line here.
//! The queue is drained only when nothing is pending AND nothing is executing,
//! because an executing task can always add more work before it returns.
//!
//! 🧠 Knowledge graph:
//! - `add`: push, wake one waiter. Never fails. Safe to call from inside a running task.
//! - `get`: pop the NEWEST task (LIFO, so deep subtrees finish before breadth explodes),
//!   run it outside the lock, return `true`. Returns `false` once drained.
//! - `wait`: park until drained. The supervisor calls this; workers call `get`.
//! - One `std::sync::Mutex` guards the list + counter. One `tokio::sync::Notify` plays
//!   condition variable. The lock is never held across an `.await`.
//! - A task that panics is caught. The executing count is released by an RAII guard no
//!   matter how the task ends, so a broken task can never wedge the drain.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Notify;
use tracing::error;

/// 📦 A unit of deferred work: call it once, get a future, await it to completion.
pub(crate) type Task = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

#[derive(Default)]
struct QueueState {
    pending: Vec<Task>,
    executing: usize,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.executing == 0
    }
}

/// 📊 Monotonic counters. Read them whenever; they only go up.
#[derive(Debug, Default)]
pub(crate) struct QueueStats {
    pub(crate) enqueued: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) peak_pending: AtomicU64,
}

impl QueueStats {
    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

enum Step {
    Run(Task),
    Drained,
    Wait,
}

pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    stats: QueueStats,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 boxed closures don't Debug, so we show the shape of the pile instead
        let state = self.lock();
        f.debug_struct("WorkQueue")
            .field("pending", &state.pending.len())
            .field("executing", &state.executing)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            stats: QueueStats::default(),
        }
    }

    // -- 🔒 a poisoned lock only means some thread panicked while holding it; the two
    // -- fields are still consistent because every mutation is a single push/pop/inc/dec
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ➕ Schedule `task`. Wakes one waiter. Never fails, never blocks on anything but the lock.
    pub(crate) fn add<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: Task = Box::new(move || task().boxed());
        let pending = {
            let mut state = self.lock();
            state.pending.push(task);
            state.pending.len() as u64
        };
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.stats.peak_pending.fetch_max(pending, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// 🔄 Pop-and-run. `true` = ran a task, come back for more. `false` = drained, go home.
    pub(crate) async fn get(&self) -> bool {
        loop {
            // -- 🎟️ register as a waiter BEFORE checking state: an enabled Notified is first in
            // -- line for notify_one, so two adds landing in the gap wake two workers, not one
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let step = {
                let mut state = self.lock();
                match state.pending.pop() {
                    Some(task) => {
                        state.executing += 1;
                        Step::Run(task)
                    }
                    None if state.executing == 0 => Step::Drained,
                    None => Step::Wait,
                }
            };

            match step {
                Step::Run(task) => {
                    let _executing = ExecutingGuard { queue: self };
                    if AssertUnwindSafe(task()).catch_unwind().await.is_err() {
                        self.stats.panicked.fetch_add(1, Ordering::Relaxed);
                        error!("💀 A queued task panicked. Its branch is lost; the queue carries on.");
                    }
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Step::Drained => {
                    self.notify.notify_waiters();
                    return false;
                }
                Step::Wait => notified.await,
            }
        }
    }

    /// 🛑 Park until nothing is pending and nothing is executing.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock().is_drained() {
                // -- 📣 pass the news along so no worker is left waiting on a signal we consumed
                self.notify.notify_waiters();
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.lock().is_drained()
    }

    pub(crate) fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

/// 🧹 Releases the executing slot on every exit path: normal return, caught panic, or the
/// worker's future being dropped mid-task during runtime shutdown.
struct ExecutingGuard<'a> {
    queue: &'a WorkQueue,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.queue.lock();
            state.executing = state.executing.saturating_sub(1);
        }
        self.queue.notify.notify_one();
    }
}
