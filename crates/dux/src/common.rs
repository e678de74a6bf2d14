//! 📦 Common data structures: the building blocks of dux.
//!
//! 🎬 INT. SOMEONE'S DRIVE. 3:47 AM.
//! A folder contains a folder. That folder contains another folder. At the
//! bottom, finally, a file named `final_FINAL_v2.pdf`. It weighs 4 GiB.
//! Nobody knows who owns it. We are about to find out.
//!
//! These structs ferry node metadata from a provider, through the walker,
//! onto the result stream and into whichever collector is listening.
//! They don't ask questions. They carry the data. 🦆

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backends::ProviderError;

/// 🔑 Opaque identity of a remote node.
///
/// Equality is exact-string. `"abc"` and `"ABC"` are strangers at a party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 📄 One node's metadata, as reported by a provider.
///
/// Providers hand these out with an empty `path`. The walker knows where it is
/// in the tree; the provider does not. The walker fills `path` in right before
/// the entry is published, like writing the return address on the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: NodeId,
    pub name: String,
    /// 🧭 Ancestor names from (but excluding) the traversal root down to the parent.
    #[serde(default, skip_deserializing)]
    pub path: Vec<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub is_trashed: bool,
    /// 📥 Where the bytes live, if anyone ever wants them. dux never does.
    #[serde(default, alias = "download_url")]
    pub download: Option<String>,
}

impl Entry {
    /// 📄 A plain file with a name and a size. Owners optional, like RSVPs.
    pub fn file(id: impl Into<NodeId>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: Vec::new(),
            size,
            owners: Vec::new(),
            is_directory: false,
            is_trashed: false,
            download: None,
        }
    }

    /// 📁 A folder. Size zero, because folders are just vibes with children.
    pub fn folder(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            is_directory: true,
            ..Self::file(id, name, 0)
        }
    }

    pub fn with_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn trashed(mut self) -> Self {
        self.is_trashed = true;
        self
    }

    /// 🧵 `a/b/c/name`, relative to the traversal root.
    pub fn full_path(&self) -> String {
        let mut joined = self.path.join("/");
        if !joined.is_empty() {
            joined.push('/');
        }
        joined.push_str(&self.name);
        joined
    }
}

/// 📃 One page of a folder listing.
///
/// `next_cursor` is `Some` when the provider has more to say. Providers always have more to say.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPage {
    pub children: Vec<NodeId>,
    pub next_cursor: Option<String>,
}

/// 📡 Which remote call fell over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetNode,
    ListChildren,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::GetNode => f.write_str("get_node"),
            Operation::ListChildren => f.write_str("list_children"),
        }
    }
}

/// 💀 A branch of the tree we could not explore, and why.
///
/// Published on the result stream instead of taking the whole process down with it.
#[derive(Debug, Clone)]
pub struct WalkFailure {
    pub node: NodeId,
    pub path: Vec<String>,
    pub operation: Operation,
    pub error: ProviderError,
}

impl fmt::Display for WalkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for node '{}' under '/{}': {}",
            self.operation,
            self.node,
            self.path.join("/"),
            self.error
        )
    }
}

/// 🎯 What comes out of the result stream.
#[derive(Debug, Clone)]
pub enum WalkEvent {
    /// ✅ A non-directory entry, path filled in.
    Leaf(Entry),
    /// 💀 A branch that could not be explored.
    Failed(WalkFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_full_path_glues_ancestors_to_the_name() {
        let mut entry = Entry::file("f1", "notes.txt", 12);
        assert_eq!(entry.full_path(), "notes.txt");

        entry.path = vec!["docs".to_string(), "2024".to_string()];
        assert_eq!(entry.full_path(), "docs/2024/notes.txt");
    }

    #[test]
    fn the_one_where_provider_json_never_smuggles_in_a_path() {
        let entry: Entry = serde_json::from_str(
            r#"{"id":"n1","name":"a.bin","size":7,"path":["sneaky"],"download_url":"https://x/y"}"#,
        )
        .expect("💀 entry JSON should parse");

        assert_eq!(entry.id, NodeId::from("n1"));
        assert!(entry.path.is_empty());
        assert_eq!(entry.download.as_deref(), Some("https://x/y"));
        assert!(!entry.is_directory);
        assert!(!entry.is_trashed);
    }
}
