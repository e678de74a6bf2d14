//! 🧵 Workers: the supervisor's private little minions.
//!
//! Each one loops `queue.get()` until the queue says it's drained, then clocks out.
//! They don't know what a tree is. They don't know what a task does. They just pop and run.
//!
//! ⚠️ Not pub. The outside world talks to the supervisor, never to the minions. 🦆

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;

use super::work_queue::WorkQueue;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 👷 Pops tasks off a [`WorkQueue`] and runs them until there is nothing left, anywhere.
#[derive(Debug)]
pub(crate) struct QueueWorker {
    id: usize,
    queue: Arc<WorkQueue>,
}

impl QueueWorker {
    pub(crate) fn new(id: usize, queue: Arc<WorkQueue>) -> Self {
        Self { id, queue }
    }
}

impl Worker for QueueWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("👷 worker {} clocking in", self.id);
            let mut ran: u64 = 0;
            while self.queue.get().await {
                ran += 1;
            }
            debug!("🏁 worker {} clocking out after {} task(s)", self.id, ran);
            Ok(())
        })
    }
}
