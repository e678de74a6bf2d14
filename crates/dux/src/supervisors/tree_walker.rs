//! 🌲 TreeWalker: turns "list this folder" into a swarm of tiny tasks.
//!
//! 🎬 *[a folder is listed. page one of four. the walker schedules page two and walks away.]*
//! *[each child gets its own metadata fetch. each folder child gets its own walk.]*
//! *[nobody waits for anybody. the queue keeps score.]*
//!
//! 🧠 Knowledge graph:
//! - walk task: list one page of `node`. More pages? Schedule a walk for the NEXT cursor.
//!   Then schedule one fetch task per child.
//! - fetch task: get the child's metadata. Trashed → gone, subtree and all. Folder → schedule a
//!   walk with the path grown by the folder's name. Anything else → publish it as a leaf.
//! - A call that still fails after the retry budget publishes [`WalkEvent::Failed`] and that
//!   branch ends there. Its siblings never notice.
//! - Publishing awaits a bounded channel. A slow consumer slows the tasks, not the memory.
//! - Consumer gone? The first failed send flips `abandoned`; every task after that returns
//!   immediately so the queue drains fast.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_channel::Sender;
use tracing::{debug, error, trace};

use crate::backends::{ProviderError, TreeProvider};
use crate::common::{NodeId, Operation, WalkEvent, WalkFailure};

use super::retry::RetryingFetcher;
use super::work_queue::WorkQueue;

pub(crate) struct TreeWalker<P> {
    fetcher: RetryingFetcher<P>,
    queue: Arc<WorkQueue>,
    events: Sender<WalkEvent>,
    abandoned: AtomicBool,
    leaves: AtomicU64,
    failures: AtomicU64,
}

impl<P> std::fmt::Debug for TreeWalker<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("abandoned", &self.abandoned)
            .field("leaves", &self.leaves)
            .field("failures", &self.failures)
            .finish()
    }
}

impl<P: TreeProvider + 'static> TreeWalker<P> {
    pub(crate) fn new(
        fetcher: RetryingFetcher<P>,
        queue: Arc<WorkQueue>,
        events: Sender<WalkEvent>,
    ) -> Self {
        Self {
            fetcher,
            queue,
            events,
            abandoned: AtomicBool::new(false),
            leaves: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// ➕ Queue a listing of one page of `node`. `path` is the names from the root (excluded)
    /// down to `node` (included).
    pub(crate) fn schedule_walk(self: &Arc<Self>, node: NodeId, path: Vec<String>, cursor: Option<String>) {
        let walker = Arc::clone(self);
        self.queue
            .add(move || async move { walker.walk(node, path, cursor).await });
    }

    fn schedule_fetch(self: &Arc<Self>, node: NodeId, path: Vec<String>) {
        let walker = Arc::clone(self);
        self.queue
            .add(move || async move { walker.fetch(node, path).await });
    }

    async fn walk(self: Arc<Self>, node: NodeId, path: Vec<String>, cursor: Option<String>) {
        if self.is_abandoned() {
            return;
        }
        let page = match self.fetcher.list_children(&node, cursor.as_deref()).await {
            Ok(page) => page,
            Err(err) => {
                self.fail(node, path, Operation::ListChildren, err).await;
                return;
            }
        };
        trace!(
            "📃 '{}' page {:?}: {} children, more: {}",
            node,
            cursor,
            page.children.len(),
            page.next_cursor.is_some()
        );
        if let Some(next) = page.next_cursor {
            self.schedule_walk(node, path.clone(), Some(next));
        }
        for child in page.children {
            self.schedule_fetch(child, path.clone());
        }
    }

    async fn fetch(self: Arc<Self>, node: NodeId, path: Vec<String>) {
        if self.is_abandoned() {
            return;
        }
        let mut entry = match self.fetcher.get_node(&node).await {
            Ok(entry) => entry,
            Err(err) => {
                self.fail(node, path, Operation::GetNode, err).await;
                return;
            }
        };
        if entry.is_trashed {
            // -- 🗑️ in the bin means out of the tally, children included
            trace!("🗑️ Skipping trashed '{}'", entry.id);
            return;
        }
        if entry.is_directory {
            let mut child_path = path;
            child_path.push(entry.name);
            self.schedule_walk(entry.id, child_path, None);
            return;
        }
        entry.path = path;
        self.leaves.fetch_add(1, Ordering::Relaxed);
        self.publish(WalkEvent::Leaf(entry)).await;
    }

    async fn fail(&self, node: NodeId, path: Vec<String>, operation: Operation, error: ProviderError) {
        let failure = WalkFailure {
            node,
            path,
            operation,
            error,
        };
        error!("💀 {}", failure);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.publish(WalkEvent::Failed(failure)).await;
    }

    async fn publish(&self, event: WalkEvent) {
        if self.events.send(event).await.is_err() && !self.abandoned.swap(true, Ordering::Relaxed) {
            debug!("🚪 The consumer left. Remaining tasks will fold without calling anyone.");
        }
    }

    fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// 🔚 Close the stream. Receivers drain whatever is buffered, then see the end.
    pub(crate) fn close(&self) {
        self.events.close();
    }

    pub(crate) fn leaves(&self) -> u64 {
        self.leaves.load(Ordering::Relaxed)
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub(crate) fn retries(&self) -> u64 {
        self.fetcher.retries()
    }

    pub(crate) fn was_abandoned(&self) -> bool {
        self.is_abandoned()
    }
}
