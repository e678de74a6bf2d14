//! 🔌 Backends: where the remote tree actually lives.
//!
//! 🌲 The walker doesn't care whether the tree is a cloud drive, a folder on
//! your laptop, or a HashMap someone hand-crafted for a unit test. It asks two
//! questions, over and over, like a toddler on a road trip:
//! "what is this node?" and "what's inside it?"
//!
//! 🎭 This module is the casting agency. Each backend implements
//! [`TreeProvider`]; [`ProviderBackend`] dispatches to whichever one the config picked.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::common::{ChildPage, Entry, NodeId};

pub(crate) mod http;
pub(crate) mod in_mem;
pub(crate) mod local_fs;

pub use http::{HttpConfig, HttpTree};
pub use in_mem::{InMemoryConfig, InMemoryTree, InMemoryTreeBuilder};
pub use local_fs::{LocalFsConfig, LocalFsTree};

// ===== Errors =====

/// 🚦 Is it worth asking again?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 🔄 Rate limits, hiccups, a server having a Monday. Try again later.
    Transient,
    /// 🧱 Not found, not allowed, not parseable. Asking again will not change the answer.
    Terminal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => f.write_str("transient"),
            ErrorKind::Terminal => f.write_str("terminal"),
        }
    }
}

/// 💀 A remote call went sideways.
///
/// Carries an [`ErrorKind`] so the retry loop can decide between "sleep and retry"
/// and "give up and tell someone".
#[derive(Debug, Clone, Error)]
#[error("{kind} provider error: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Terminal,
            message: message.into(),
        }
    }

    pub fn not_found(id: &NodeId) -> Self {
        Self::terminal(format!("node '{id}' not found"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

// ===== Provider Trait and Backend Enum =====

/// 🌲 A hierarchical remote store that can describe a node and page through its children.
///
/// # Contract 📜
/// - `get_node` returns the node's metadata with an empty `path`.
/// - `list_children` returns one page. `cursor = None` asks for the first page;
///   the returned `next_cursor` asks for the one after.
/// - Both take `&self`: dozens of workers hold the same provider at once.
#[async_trait]
pub trait TreeProvider: Send + Sync + fmt::Debug {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError>;

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError>;
}

/// 🎭 Which tree should we go climbing today?
///
/// Externally tagged, so the TOML reads `[provider.LocalFs]` and friends.
#[derive(Debug, Deserialize, Clone)]
pub enum ProviderConfig {
    InMemory(InMemoryConfig),
    LocalFs(LocalFsConfig),
    Http(HttpConfig),
}

impl Default for ProviderConfig {
    /// 📁 No provider configured means the local disk. `dux du .` should just work.
    fn default() -> Self {
        ProviderConfig::LocalFs(LocalFsConfig::default())
    }
}

/// 🎭 The many faces of a provider. A universal remote for trees.
#[derive(Debug)]
pub enum ProviderBackend {
    InMemory(InMemoryTree),
    LocalFs(LocalFsTree),
    Http(HttpTree),
}

impl ProviderBackend {
    /// 🏗️ Build whichever backend the config asked for.
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
        let backend = match config {
            ProviderConfig::InMemory(c) => ProviderBackend::InMemory(
                InMemoryTree::from_config(c)
                    .await
                    .context("💀 Failed to load the in-memory tree fixture")?,
            ),
            ProviderConfig::LocalFs(c) => ProviderBackend::LocalFs(LocalFsTree::new(c.clone())),
            ProviderConfig::Http(c) => ProviderBackend::Http(
                HttpTree::new(c.clone()).context("💀 Failed to build the HTTP tree provider")?,
            ),
        };
        Ok(backend)
    }

    /// 🏠 The root to walk when nobody named one.
    pub fn default_root(&self) -> Option<NodeId> {
        match self {
            ProviderBackend::InMemory(tree) => Some(tree.root().clone()),
            ProviderBackend::LocalFs(tree) => tree.default_root(),
            ProviderBackend::Http(tree) => tree.default_root(),
        }
    }
}

#[async_trait]
impl TreeProvider for ProviderBackend {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        match self {
            ProviderBackend::InMemory(tree) => tree.get_node(id).await,
            ProviderBackend::LocalFs(tree) => tree.get_node(id).await,
            ProviderBackend::Http(tree) => tree.get_node(id).await,
        }
    }

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        match self {
            ProviderBackend::InMemory(tree) => tree.list_children(id, cursor).await,
            ProviderBackend::LocalFs(tree) => tree.list_children(id, cursor).await,
            ProviderBackend::Http(tree) => tree.list_children(id, cursor).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_only_transient_errors_get_a_second_date() {
        assert!(ProviderError::transient("429").is_retryable());
        assert!(!ProviderError::terminal("403").is_retryable());
        assert!(!ProviderError::not_found(&NodeId::from("ghost")).is_retryable());
    }

    #[test]
    fn the_one_where_error_messages_say_what_kind_of_bad_day_it_was() {
        let err = ProviderError::not_found(&NodeId::from("ghost"));
        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert_eq!(
            err.to_string(),
            "terminal provider error: node 'ghost' not found"
        );
    }
}
