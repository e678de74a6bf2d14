//! 🧪 Test doubles for the engine: an in-memory tree that fails on cue and keeps a call log.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::backends::{InMemoryTree, ProviderError, TreeProvider};
use crate::common::{ChildPage, Entry, NodeId};

/// 🌲 root → three folders → two files each. Six leaves, every one ten bytes.
pub(crate) fn scenario_a_tree(page_size: usize) -> InMemoryTree {
    let mut builder = InMemoryTree::builder("root").page_size(page_size);
    for (folder_id, folder_name) in [("sub-a", "alpha"), ("sub-b", "beta"), ("sub-c", "gamma")] {
        builder = builder.folder("root", folder_id, folder_name);
        for n in 1..=2 {
            let file_id = format!("{folder_id}-f{n}");
            builder = builder.entry(
                folder_id,
                Entry::file(file_id.as_str(), format!("{folder_name}-{n}.txt"), 10)
                    .with_owners(["me@example.com"]),
            );
        }
    }
    builder.build()
}

/// 🎭 Wraps an [`InMemoryTree`]; can fail the first N calls for a node, or panic outright.
#[derive(Debug)]
pub(crate) struct FlakyTree {
    inner: InMemoryTree,
    faults: Mutex<HashMap<NodeId, (u32, ProviderError)>>,
    calls: Mutex<HashMap<NodeId, Vec<Instant>>>,
    panics_on: Option<NodeId>,
}

impl FlakyTree {
    pub(crate) fn new(inner: InMemoryTree) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            panics_on: None,
        }
    }

    pub(crate) fn scenario_a() -> Self {
        Self::new(scenario_a_tree(100))
    }

    /// 💥 The first `times` calls touching `id` (either operation) return `err`.
    pub(crate) fn fail_first(self, id: &str, times: u32, err: ProviderError) -> Self {
        self.faults
            .lock()
            .expect("💀 faults lock")
            .insert(NodeId::from(id), (times, err));
        self
    }

    pub(crate) fn panic_on(mut self, id: &str) -> Self {
        self.panics_on = Some(NodeId::from(id));
        self
    }

    /// 📜 When each call touching `id` started, oldest first.
    pub(crate) fn calls_for(&self, id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("💀 calls lock")
            .get(&NodeId::from(id))
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, id: &NodeId) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .expect("💀 calls lock")
            .entry(id.clone())
            .or_default()
            .push(Instant::now());
        if self.panics_on.as_ref() == Some(id) {
            panic!("🐛 provider exploded on '{id}'");
        }
        let mut faults = self.faults.lock().expect("💀 faults lock");
        if let Some((remaining, err)) = faults.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(err.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TreeProvider for FlakyTree {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        self.check(id)?;
        self.inner.get_node(id).await
    }

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        self.check(id)?;
        self.inner.list_children(id, cursor).await
    }
}
