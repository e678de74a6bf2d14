//! 🎬 *[camera pans across a folder with four hundred subfolders]*
//! 🎬 "In a world where every folder hides another folder..."
//! 🎬 "One supervisor dared to count them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: seeds the queue with the root, hires the workers, waits for the
//! queue to drain for real, then closes the result stream. Exactly once. Every time.
//!
//! 🧠 Knowledge graph:
//! ```text
//! walk(provider, root, options)
//!   └─ supervisor task
//!        ├─ WorkQueue ← seeded with "walk root"
//!        ├─ N × QueueWorker: while queue.get().await {}
//!        ├─ queue.wait()            (pending == 0 && executing == 0)
//!        └─ close stream → WalkSummary
//! ResultStream ← Leaf / Failed events, unordered, possibly duplicated
//! ```
//!
//! ⚠️ The workers are the supervisor's private minions. They stay private.

pub mod config;
mod retry;
mod tree_walker;
mod work_queue;
mod workers;

#[cfg(test)]
pub(crate) mod testing;

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context as TaskContext, Poll};

use anyhow::{Context, Result};
use futures::Stream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backends::TreeProvider;
use crate::common::{NodeId, WalkEvent};
use config::{RetryConfig, RuntimeConfig};
use retry::RetryingFetcher;
use tree_walker::TreeWalker;
use work_queue::WorkQueue;
use workers::{QueueWorker, Worker};

pub use retry::{Backoff, Growth, RetryPolicy};

/// 🔧 Everything one traversal needs to know about how to behave.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// 👷 Concurrent workers. Zero is promoted to one; a walk with no walkers is a long wait.
    pub workers: usize,
    /// 📦 Events buffered before publishers start waiting on the consumer.
    pub result_buffer: usize,
    pub retry: RetryPolicy,
}

impl Default for WalkOptions {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            workers: runtime.workers,
            result_buffer: runtime.result_buffer,
            retry: RetryPolicy::default(),
        }
    }
}

impl WalkOptions {
    pub fn from_config(runtime: &RuntimeConfig, retry: &RetryConfig) -> Result<Self> {
        Ok(Self {
            workers: runtime.workers,
            result_buffer: runtime.result_buffer,
            retry: retry.to_policy()?,
        })
    }
}

/// 📊 The post-game stats, available once the walk has fully drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub tasks_enqueued: u64,
    pub tasks_run: u64,
    pub tasks_panicked: u64,
    pub retries: u64,
    pub leaves: u64,
    pub failures: u64,
    pub peak_pending: u64,
    /// 🚪 The consumer hung up before the walk finished.
    pub abandoned: bool,
}

/// 🚀 Start walking the tree under `root`. Returns immediately; events arrive on the stream.
///
/// Must be called from inside a tokio runtime. The root itself is listed, never fetched, and is
/// never reported as a leaf.
pub fn walk<P>(provider: Arc<P>, root: NodeId, options: WalkOptions) -> ResultStream
where
    P: TreeProvider + 'static,
{
    // -- 📦 a zero-capacity async_channel panics, so the floor is one
    let (sender, receiver) = async_channel::bounded(options.result_buffer.max(1));
    let worker_count = options.workers.max(1);
    let queue = Arc::new(WorkQueue::new());
    let fetcher = RetryingFetcher::new(provider, options.retry);
    let walker = Arc::new(TreeWalker::new(fetcher, Arc::clone(&queue), sender));

    let supervisor = tokio::spawn(async move {
        info!("🌲 Walking '{}' with {} worker(s)", root, worker_count);
        walker.schedule_walk(root, Vec::new(), None);

        let workers: Vec<JoinHandle<Result<()>>> = (0..worker_count)
            .map(|id| QueueWorker::new(id, Arc::clone(&queue)).start())
            .collect();

        queue.wait().await;
        debug_assert!(queue.is_drained());
        walker.close();

        for worker in workers {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("⚠️ A worker quit with an error: {:#}", err),
                Err(err) => warn!("⚠️ A worker could not be joined: {}", err),
            }
        }

        let stats = queue.stats();
        let summary = WalkSummary {
            tasks_enqueued: stats.enqueued.load(Ordering::Relaxed),
            tasks_run: stats.completed(),
            tasks_panicked: stats.panicked(),
            retries: walker.retries(),
            leaves: walker.leaves(),
            failures: walker.failures(),
            peak_pending: stats.peak_pending.load(Ordering::Relaxed),
            abandoned: walker.was_abandoned(),
        };
        debug!("📊 Walk drained: {:?}", summary);
        summary
    });

    ResultStream {
        events: Box::pin(receiver),
        supervisor,
    }
}

/// 📡 The receiving end of a walk. Unordered, may repeat a node, ends when the walk drains.
///
/// Read it with [`recv`](Self::recv) or as a [`Stream`]. Drop it early and the walk notices and
/// winds down. Call [`finish`](Self::finish) for the [`WalkSummary`].
#[derive(Debug)]
pub struct ResultStream {
    // -- 📌 async_channel's Receiver is !Unpin, so it lives on the heap and the stream stays Unpin
    events: Pin<Box<async_channel::Receiver<WalkEvent>>>,
    supervisor: JoinHandle<WalkSummary>,
}

impl ResultStream {
    /// 📬 Next event, or `None` once the walk has drained and the buffer is empty.
    pub async fn recv(&self) -> Option<WalkEvent> {
        self.events.recv().await.ok()
    }

    /// 🏁 Stop listening and wait for the supervisor's summary. Unread events are discarded.
    pub async fn finish(self) -> Result<WalkSummary> {
        drop(self.events);
        self.supervisor
            .await
            .context("💀 The walk supervisor died before it could report back")
    }
}

impl Stream for ResultStream {
    type Item = WalkEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<WalkEvent>> {
        self.events.as_mut().poll_next(cx)
    }
}
