//! 🌲 dux: `du` and `find` for trees that live somewhere else.
//!
//! 🎬 *[a cloud drive. eleven years of folders. one question: "where did the 2 TiB go?"]*
//!
//! The engine ([`supervisors::walk`]) lists folders and fetches metadata with a pool of workers,
//! retries the remote's bad moods with backoff, and streams every leaf to whoever is listening.
//! The listeners ([`collectors`]) turn the stream into reports. [`run`] wires config, provider,
//! engine and report together for the CLI.

pub mod app_config;
pub mod backends;
pub mod collectors;
pub mod common;
mod progress;
pub mod supervisors;

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{info, warn};

use crate::app_config::AppConfig;
use crate::backends::ProviderBackend;
use crate::collectors::{Collector, DuCollector, FindCollector, Report, SeenFilter};
use crate::common::{NodeId, WalkEvent, WalkFailure};
use crate::progress::WalkProgress;
use crate::supervisors::{ResultStream, WalkOptions, WalkSummary, walk};

/// 🎯 What the user wants to know about the tree.
#[derive(Debug, Clone)]
pub enum Command {
    /// 📊 Storage by top-level folder, by owner, and total.
    Du {
        root: Option<NodeId>,
        sort_by_size: bool,
    },
    /// 🔎 Every unique leaf's path.
    Find { root: Option<NodeId> },
}

impl Command {
    fn root(&self) -> Option<&NodeId> {
        match self {
            Command::Du { root, .. } | Command::Find { root } => root.as_ref(),
        }
    }

    fn report(&self) -> Report {
        match self {
            Command::Du { sort_by_size, .. } => Report::Du(DuCollector::new(*sort_by_size)),
            Command::Find { .. } => Report::Find(FindCollector::new()),
        }
    }
}

/// 📦 Everything a run produced: the printable report, the branches that broke, and the stats.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: String,
    pub failures: Vec<WalkFailure>,
    pub duplicates: u64,
    pub summary: WalkSummary,
}

impl RunOutcome {
    /// ✅ Every branch was explored: nothing failed and no task died mid-branch.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.summary.tasks_panicked == 0
    }
}

/// 🚀 Build the provider, walk the tree, fold the leaves into the requested report.
pub async fn run(app_config: AppConfig, command: Command) -> Result<RunOutcome> {
    let backend = ProviderBackend::from_config(&app_config.provider)
        .await
        .context("💀 Couldn't build the tree provider from config")?;
    let root = command
        .root()
        .cloned()
        .or_else(|| backend.default_root())
        .context("💀 No root to walk. Pass one on the command line, or set `root` in the provider config.")?;
    let options = WalkOptions::from_config(&app_config.runtime, &app_config.retry)?;

    info!("🚀 {:?} under '{}'", command, root);
    let stream = walk(Arc::new(backend), root, options);
    let mut progress = WalkProgress::new(app_config.runtime.progress);
    let outcome = consume(stream, command.report(), &mut progress).await;
    progress.finish();
    outcome
}

/// 🍽️ Drain the stream into `report`, skipping nodes already counted.
async fn consume(
    mut stream: ResultStream,
    mut report: Report,
    progress: &mut WalkProgress,
) -> Result<RunOutcome> {
    let mut seen = SeenFilter::new();
    let mut failures = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            WalkEvent::Leaf(entry) => {
                if seen.first_sighting(&entry.id) {
                    progress.record_leaf(entry.size);
                    report.collect(&entry);
                } else {
                    progress.record_duplicate();
                }
            }
            WalkEvent::Failed(failure) => {
                progress.record_failure();
                failures.push(failure);
            }
        }
    }
    let summary = stream.finish().await?;
    if !failures.is_empty() {
        warn!("⚠️ {} branch(es) could not be explored; totals are partial", failures.len());
    }
    if summary.tasks_panicked > 0 {
        // -- 💥 a panicked task took its subtree with it, and nobody published a failure for it
        warn!(
            "⚠️ {} task(s) panicked; their branches are missing and totals are partial",
            summary.tasks_panicked
        );
    }
    info!(
        "🏁 {} unique leaves, {} duplicate(s), {} retries, {} tasks",
        seen.unique(),
        seen.duplicates(),
        summary.retries,
        summary.tasks_run
    );
    Ok(RunOutcome {
        report: report.render(),
        failures,
        duplicates: seen.duplicates(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryConfig, ProviderConfig};
    use crate::supervisors::config::RuntimeConfig;
    use crate::supervisors::testing::FlakyTree;

    const FIXTURE: &str = r#"{
        "id": "root",
        "children": [
            {"id": "photos", "name": "photos", "children": [
                {"id": "p1", "name": "beach.jpg", "size": 300, "owners": ["ann"]},
                {"id": "shared", "name": "cat.jpg", "size": 100, "owners": ["ann", "bob"]}
            ]},
            {"id": "docs", "name": "docs", "children": [
                {"id": "d1", "name": "cv.pdf", "size": 50, "owners": ["bob"]},
                {"id": "shared", "name": "cat.jpg", "size": 100, "owners": ["ann", "bob"]},
                {"id": "bin", "name": "old.doc", "size": 9999, "trashed": true}
            ]},
            {"id": "loose", "name": "loose.txt", "size": 7}
        ]
    }"#;

    fn config_for(dir: &tempfile::TempDir) -> AppConfig {
        let fixture = dir.path().join("tree.json");
        std::fs::write(&fixture, FIXTURE).expect("💀 write fixture");
        AppConfig {
            provider: ProviderConfig::InMemory(InMemoryConfig {
                fixture,
                page_size: 2,
            }),
            runtime: RuntimeConfig {
                workers: 4,
                progress: false,
                ..RuntimeConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn the_one_where_du_counts_the_shared_cat_once() {
        let dir = tempfile::tempdir().expect("💀 tempdir");
        let outcome = run(
            config_for(&dir),
            Command::Du {
                root: None,
                sort_by_size: true,
            },
        )
        .await
        .expect("💀 du should run");

        assert!(outcome.is_complete());
        assert_eq!(outcome.duplicates, 1);
        assert!(outcome.report.ends_with("Total size: 457\n"));
        let photos = outcome.report.find("photos/").expect("💀 photos row");
        let docs = outcome.report.find("docs/").expect("💀 docs row");
        let loose = outcome.report.find("loose.txt").expect("💀 loose row");
        // -- 🏆 -s: whichever folder the cat was counted under, photos > docs > loose
        assert!(photos < docs);
        assert!(docs < loose);
        assert!(!outcome.report.contains("9999"));
    }

    #[tokio::test]
    async fn the_one_where_find_lists_each_leaf_path() {
        let dir = tempfile::tempdir().expect("💀 tempdir");
        let outcome = run(
            config_for(&dir),
            Command::Find {
                root: Some(NodeId::from("docs")),
            },
        )
        .await
        .expect("💀 find should run");

        assert_eq!(outcome.report, "cat.jpg\ncv.pdf\nTotal size: 150\n");
        assert_eq!(outcome.summary.leaves, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_missing_root_is_reported_not_walked() {
        let dir = tempfile::tempdir().expect("💀 tempdir");
        let outcome = run(
            config_for(&dir),
            Command::Find {
                root: Some(NodeId::from("ghost")),
            },
        )
        .await
        .expect("💀 a bad root is a failed branch, not a crash");

        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].node, NodeId::from("ghost"));
    }

    #[tokio::test]
    async fn the_one_where_a_panicked_branch_makes_the_run_partial() {
        let tree = Arc::new(FlakyTree::scenario_a().panic_on("sub-c"));
        let stream = walk(
            tree,
            NodeId::from("root"),
            WalkOptions {
                workers: 2,
                ..WalkOptions::default()
            },
        );
        let outcome = consume(
            stream,
            Report::Find(FindCollector::new()),
            &mut WalkProgress::new(false),
        )
        .await
        .expect("💀 a panic is a missing branch, not a crashed run");

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.summary.tasks_panicked, 1);
        // -- 🕳️ sub-c's two files never showed up, so the total is short and the run says so
        assert!(outcome.report.ends_with("Total size: 40\n"));
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn the_one_where_the_local_disk_needs_a_root() {
        let err = run(AppConfig::default(), Command::Find { root: None })
            .await
            .expect_err("💀 no root anywhere");
        assert!(format!("{:#}", err).contains("No root to walk"));
    }
}
