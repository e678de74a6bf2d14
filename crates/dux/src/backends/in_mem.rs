//! # Previously, on dux...
//!
//! 🎬 The tree was trapped. Stranded in a JSON file, or worse, in a unit test.
//! Someone had to serve it. Someone had to be brave. Someone had to write a
//! provider so simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! `in_mem` provides [`InMemoryTree`], a [`TreeProvider`] backed by a HashMap.
//! Build it in code with [`InMemoryTreeBuilder`], or load a nested JSON fixture
//! from disk. Listings are paged with a configurable page size, so pagination
//! gets exercised without a single network packet.
//!
//! ⚠️ This is for tests and demos. If you're deploying this to prod, please
//! also deploy a therapist.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::backends::{ProviderError, TreeProvider};
use crate::common::{ChildPage, Entry, NodeId};

/// 🔧 Where the fixture lives and how chatty each listing page is.
#[derive(Debug, Deserialize, Clone)]
pub struct InMemoryConfig {
    pub fixture: PathBuf,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

// -- 📃 100 children per page. a drive API's favourite number, give or take.
fn default_page_size() -> usize {
    100
}

#[derive(Debug, Clone)]
struct InMemoryNode {
    entry: Entry,
    children: Vec<NodeId>,
}

/// 🌲 A whole tree, in a HashMap, in RAM. No disk. No network. No heartbeat.
#[derive(Debug, Clone)]
pub struct InMemoryTree {
    root: NodeId,
    nodes: HashMap<NodeId, InMemoryNode>,
    page_size: usize,
}

impl InMemoryTree {
    /// 🏗️ Start a tree whose root folder is `root`.
    pub fn builder(root: impl Into<NodeId>) -> InMemoryTreeBuilder {
        InMemoryTreeBuilder::new(root.into())
    }

    /// 📂 Load the fixture named in the config.
    pub async fn from_config(config: &InMemoryConfig) -> Result<Self> {
        let raw = tokio::fs::read_to_string(&config.fixture)
            .await
            .with_context(|| {
                format!(
                    "💀 Couldn't read tree fixture '{}'. It exists in our hearts, but apparently not on disk.",
                    config.fixture.display()
                )
            })?;
        let tree = Self::from_fixture_json(&raw, config.page_size)?;
        debug!(
            "🌲 Loaded in-memory tree with {} nodes from {}",
            tree.nodes.len(),
            config.fixture.display()
        );
        Ok(tree)
    }

    /// 🧩 Parse a nested fixture:
    ///
    /// ```json
    /// {"id": "root", "name": "", "children": [
    ///     {"id": "a", "name": "docs", "children": [
    ///         {"id": "f1", "name": "cv.pdf", "size": 1024, "owners": ["me@example.com"]}
    ///     ]}
    /// ]}
    /// ```
    ///
    /// A node with `children` (even `[]`) is a folder. An id that shows up twice is one node
    /// shared by two parents, which is exactly how duplicates sneak into a walk.
    pub fn from_fixture_json(raw: &str, page_size: usize) -> Result<Self> {
        let fixture: FixtureNode =
            serde_json::from_str(raw).context("💀 Tree fixture is not valid JSON. Or not a tree. Or neither.")?;
        let root_id = NodeId::from(fixture.id.clone());
        let mut builder = InMemoryTreeBuilder::new(root_id.clone()).page_size(page_size);
        for child in fixture.children.unwrap_or_default() {
            child.plant(&root_id, &mut builder);
        }
        Ok(builder.build())
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl TreeProvider for InMemoryTree {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        self.nodes
            .get(id)
            .map(|node| node.entry.clone())
            .ok_or_else(|| ProviderError::not_found(id))
    }

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        let node = self.nodes.get(id).ok_or_else(|| ProviderError::not_found(id))?;
        // -- 📃 the cursor is just an offset wearing a string costume
        let start = match cursor {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ProviderError::terminal(format!("bad page cursor '{raw}' for node '{id}'"))
            })?,
        };
        let start = start.min(node.children.len());
        let end = start.saturating_add(self.page_size).min(node.children.len());
        let next_cursor = (end < node.children.len()).then(|| end.to_string());
        Ok(ChildPage {
            children: node.children[start..end].to_vec(),
            next_cursor,
        })
    }
}

/// 🧱 Builds an [`InMemoryTree`] one node at a time.
#[derive(Debug)]
pub struct InMemoryTreeBuilder {
    root: NodeId,
    nodes: HashMap<NodeId, InMemoryNode>,
    page_size: usize,
}

impl InMemoryTreeBuilder {
    fn new(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            InMemoryNode {
                entry: Entry::folder(root.clone(), ""),
                children: Vec::new(),
            },
        );
        Self {
            root,
            nodes,
            page_size: default_page_size(),
        }
    }

    /// 📃 Children per listing page. Zero is promoted to one; a page of nothing pages forever.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn folder(self, parent: &str, id: &str, name: &str) -> Self {
        self.entry(parent, Entry::folder(id, name))
    }

    pub fn file(self, parent: &str, id: &str, name: &str, size: u64) -> Self {
        self.entry(parent, Entry::file(id, name, size))
    }

    /// 🌱 Hang `entry` under `parent`. A missing parent is created as an anonymous folder.
    /// An entry id that already exists keeps its first metadata and gains another parent.
    pub fn entry(mut self, parent: &str, entry: Entry) -> Self {
        self.insert(&NodeId::from(parent), entry);
        self
    }

    fn insert(&mut self, parent: &NodeId, entry: Entry) {
        let child_id = entry.id.clone();
        self.nodes.entry(child_id.clone()).or_insert(InMemoryNode {
            entry,
            children: Vec::new(),
        });
        self.nodes
            .entry(parent.clone())
            .or_insert_with(|| InMemoryNode {
                entry: Entry::folder(parent.clone(), parent.as_str()),
                children: Vec::new(),
            })
            .children
            .push(child_id);
    }

    pub fn build(self) -> InMemoryTree {
        InMemoryTree {
            root: self.root,
            nodes: self.nodes,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FixtureNode {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    owners: Vec<String>,
    #[serde(default)]
    trashed: bool,
    #[serde(default)]
    download: Option<String>,
    #[serde(default)]
    children: Option<Vec<FixtureNode>>,
}

impl FixtureNode {
    fn plant(self, parent: &NodeId, builder: &mut InMemoryTreeBuilder) {
        let id = NodeId::from(self.id);
        let entry = Entry {
            id: id.clone(),
            name: self.name,
            path: Vec::new(),
            size: self.size,
            owners: self.owners,
            is_directory: self.children.is_some(),
            is_trashed: self.trashed,
            download: self.download,
        };
        builder.insert(parent, entry);
        for child in self.children.unwrap_or_default() {
            child.plant(&id, builder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_pages_hand_out_children_in_polite_portions() {
        let tree = InMemoryTree::builder("root")
            .page_size(2)
            .file("root", "a", "a.txt", 1)
            .file("root", "b", "b.txt", 2)
            .file("root", "c", "c.txt", 3)
            .build();

        let first = tree
            .list_children(&NodeId::from("root"), None)
            .await
            .expect("💀 first page");
        assert_eq!(first.children, vec![NodeId::from("a"), NodeId::from("b")]);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let second = tree
            .list_children(&NodeId::from("root"), first.next_cursor.as_deref())
            .await
            .expect("💀 second page");
        assert_eq!(second.children, vec![NodeId::from("c")]);
        assert_eq!(second.next_cursor, None);
    }

    #[tokio::test]
    async fn the_one_where_ghost_nodes_are_terminally_not_found() {
        let tree = InMemoryTree::builder("root").build();
        let err = tree
            .get_node(&NodeId::from("ghost"))
            .await
            .expect_err("💀 ghosts should not resolve");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn the_one_where_a_garbage_cursor_is_not_politely_ignored() {
        let tree = InMemoryTree::builder("root").build();
        let err = tree
            .list_children(&NodeId::from("root"), Some("banana"))
            .await
            .expect_err("💀 bananas are not offsets");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn the_one_where_the_fixture_grows_into_a_tree() {
        let raw = r#"{
            "id": "root",
            "children": [
                {"id": "docs", "name": "docs", "children": [
                    {"id": "cv", "name": "cv.pdf", "size": 1024, "owners": ["me@example.com"]},
                    {"id": "old", "name": "old.doc", "size": 5, "trashed": true}
                ]},
                {"id": "empty", "name": "empty", "children": []},
                {"id": "cv", "name": "cv.pdf", "size": 1024}
            ]
        }"#;
        let tree = InMemoryTree::from_fixture_json(raw, 10).expect("💀 fixture should parse");

        assert_eq!(tree.root(), &NodeId::from("root"));
        // root + docs + cv + old + empty; the second "cv" is the same node
        assert_eq!(tree.len(), 5);

        let docs = tree.get_node(&NodeId::from("docs")).await.expect("💀 docs");
        assert!(docs.is_directory);
        let empty = tree.get_node(&NodeId::from("empty")).await.expect("💀 empty");
        assert!(empty.is_directory);
        let old = tree.get_node(&NodeId::from("old")).await.expect("💀 old");
        assert!(old.is_trashed);

        let root_page = tree
            .list_children(&NodeId::from("root"), None)
            .await
            .expect("💀 root listing");
        assert_eq!(root_page.children.len(), 3);
        assert_eq!(root_page.children[2], NodeId::from("cv"));
    }
}
