//! 📁 The local filesystem, cosplaying as a remote drive.
//!
//! 🗺️ Node identity is the absolute path. Listings are the directory's entries sorted by
//! name, handed out one page at a time with the offset as the cursor. Metadata comes from
//! `symlink_metadata`, so a symlink is a leaf and a loop of symlinks is not our problem.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::{ProviderError, TreeProvider};
use crate::common::{ChildPage, Entry, NodeId};

/// 🔧 Local filesystem knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct LocalFsConfig {
    /// 🏠 Default root when the CLI isn't given one.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    1000
}

impl Default for LocalFsConfig {
    fn default() -> Self {
        Self {
            root: None,
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsTree {
    config: LocalFsConfig,
}

impl LocalFsTree {
    pub fn new(config: LocalFsConfig) -> Self {
        Self { config }
    }

    pub fn default_root(&self) -> Option<NodeId> {
        self.config
            .root
            .as_ref()
            .map(|root| NodeId::from(root.to_string_lossy().into_owned()))
    }
}

/// 🚦 NotFound and PermissionDenied will say the same thing tomorrow. Everything else might not.
fn classify_io(id: &NodeId, err: io::Error) -> ProviderError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            ProviderError::terminal(format!("'{id}': {err}"))
        }
        _ => ProviderError::transient(format!("'{id}': {err}")),
    }
}

#[cfg(unix)]
fn owners_of(metadata: &std::fs::Metadata) -> Vec<String> {
    use std::os::unix::fs::MetadataExt;
    vec![format!("uid:{}", metadata.uid())]
}

#[cfg(not(unix))]
fn owners_of(_metadata: &std::fs::Metadata) -> Vec<String> {
    Vec::new()
}

#[async_trait]
impl TreeProvider for LocalFsTree {
    async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        let path = Path::new(id.as_str());
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|err| classify_io(id, err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string());
        let is_directory = metadata.is_dir();
        Ok(Entry {
            id: id.clone(),
            name,
            path: Vec::new(),
            size: if is_directory { 0 } else { metadata.len() },
            owners: owners_of(&metadata),
            is_directory,
            is_trashed: false,
            download: Some(format!("file://{}", path.display())),
        })
    }

    async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        let start = match cursor {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ProviderError::terminal(format!("bad page cursor '{raw}' for '{id}'"))
            })?,
        };

        let mut read_dir = tokio::fs::read_dir(id.as_str())
            .await
            .map_err(|err| classify_io(id, err))?;
        let mut names = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| classify_io(id, err))?
        {
            names.push(dir_entry.path());
        }
        // -- 🔢 read_dir order is whatever the kernel felt like; offsets need a stable order
        names.sort();

        let page_size = self.config.page_size.max(1);
        let start = start.min(names.len());
        let end = start.saturating_add(page_size).min(names.len());
        let next_cursor = (end < names.len()).then(|| end.to_string());
        Ok(ChildPage {
            children: names[start..end]
                .iter()
                .map(|path| NodeId::from(path.to_string_lossy().into_owned()))
                .collect(),
            next_cursor,
        })
    }
}
