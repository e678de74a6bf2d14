//! 🎬 *[the walk is over. six thousand leaves lie on the floor, in no particular order.]*
//! *[someone has to sweep them into piles. by folder. by owner. alphabetically, if asked nicely.]*
//!
//! 📦 The Collectors module: the consumers at the far end of the result stream.
//!
//! 🧠 Knowledge graph:
//! - **SeenFilter**: the walk may hand us the same node twice (one file, two parent folders).
//!   Counting it twice would be a lie, so every collector only sees a node's first appearance.
//! - **DuCollector**: totals bytes by top-level folder, by owner, and overall.
//! - **FindCollector**: remembers every leaf's path.
//! - **Report**: the enum dispatcher, so the run loop holds one thing and calls one method.
//!
//! ```text
//! ResultStream → Leaf(entry) → SeenFilter::first_sighting → collector.collect(&entry)
//! ```
//!
//! 🦆 Sizes are raw byte counts. Pretty numbers are a different movie.

use std::collections::{HashMap, HashSet};
use std::fmt;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

use crate::common::{Entry, NodeId};

// ===== Dedup =====

/// 🔍 Remembers which nodes have already been counted.
#[derive(Debug, Default)]
pub struct SeenFilter {
    seen: HashSet<NodeId>,
    duplicates: u64,
}

impl SeenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// ✅ `true` the first time `id` shows up, `false` every time after.
    pub fn first_sighting(&mut self, id: &NodeId) -> bool {
        if self.seen.contains(id) {
            self.duplicates += 1;
            return false;
        }
        self.seen.insert(id.clone());
        true
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn unique(&self) -> usize {
        self.seen.len()
    }
}

// ===== Trait =====

/// 📦 Folds unique leaves into a report.
pub trait Collector: fmt::Debug {
    fn collect(&mut self, entry: &Entry);

    /// 🖨️ The finished report, ready for stdout.
    fn render(&self) -> String;
}

// ===== du =====

/// 📊 Bytes by top-level folder, by owner, and in total.
#[derive(Debug, Default)]
pub struct DuCollector {
    by_folder: HashMap<String, u64>,
    by_owner: HashMap<String, u64>,
    total: u64,
    sort_by_size: bool,
}

impl DuCollector {
    /// `sort_by_size` orders the folder table biggest first; otherwise it is by name.
    pub fn new(sort_by_size: bool) -> Self {
        Self {
            sort_by_size,
            ..Self::default()
        }
    }

    /// 📁 Folder rows. A file sitting directly under the root is its own row, keyed by name;
    /// everything deeper is filed under its top-level folder with a trailing `/`.
    pub fn by_folder(&self) -> Vec<(String, u64)> {
        if self.sort_by_size {
            by_size_desc(&self.by_folder)
        } else {
            let mut rows: Vec<_> = self
                .by_folder
                .iter()
                .map(|(key, size)| (key.clone(), *size))
                .collect();
            rows.sort();
            rows
        }
    }

    /// 👤 Owner rows, always biggest first. A file with three owners counts for all three.
    pub fn by_owner(&self) -> Vec<(String, u64)> {
        by_size_desc(&self.by_owner)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

fn folder_key(entry: &Entry) -> String {
    match entry.path.first() {
        Some(top) => format!("{top}/"),
        None => entry.name.clone(),
    }
}

// -- 🏆 ties broken by name so the output doesn't reshuffle between runs
fn by_size_desc(sizes: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut rows: Vec<_> = sizes.iter().map(|(key, size)| (key.clone(), *size)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn size_table(rows: &[(String, u64)]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    for (key, size) in rows {
        table.add_row(vec![
            Cell::new(size).set_alignment(CellAlignment::Right),
            Cell::new(key),
        ]);
    }
    table
}

impl Collector for DuCollector {
    fn collect(&mut self, entry: &Entry) {
        self.total += entry.size;
        *self.by_folder.entry(folder_key(entry)).or_default() += entry.size;
        for owner in &entry.owners {
            *self.by_owner.entry(owner.clone()).or_default() += entry.size;
        }
    }

    fn render(&self) -> String {
        format!(
            "Storage by folder\n-----------------\n{}\n\nStorage by owner\n----------------\n{}\n\nTotal size: {}\n",
            size_table(&self.by_folder()),
            size_table(&self.by_owner()),
            self.total
        )
    }
}

// ===== find =====

/// 🔎 Every leaf's path, relative to the walk root.
#[derive(Debug, Default)]
pub struct FindCollector {
    paths: Vec<String>,
    total: u64,
}

impl FindCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🧵 Sorted, since the walk delivers in whatever order the workers felt like.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = self.paths.clone();
        paths.sort();
        paths
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Collector for FindCollector {
    fn collect(&mut self, entry: &Entry) {
        self.paths.push(entry.full_path());
        self.total += entry.size;
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for path in self.paths() {
            out.push_str(&path);
            out.push('\n');
        }
        out.push_str(&format!("Total size: {}\n", self.total));
        out
    }
}

// ===== Dispatcher Enum =====

/// 🎭 Whichever report the user asked for.
#[derive(Debug)]
pub enum Report {
    Du(DuCollector),
    Find(FindCollector),
}

impl Collector for Report {
    fn collect(&mut self, entry: &Entry) {
        match self {
            Report::Du(collector) => collector.collect(entry),
            Report::Find(collector) => collector.collect(entry),
        }
    }

    fn render(&self) -> String {
        match self {
            Report::Du(collector) => collector.render(),
            Report::Find(collector) => collector.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, path: &[&str], name: &str, size: u64, owners: &[&str]) -> Entry {
        let mut entry = Entry::file(id, name, size).with_owners(owners.iter().copied());
        entry.path = path.iter().map(|p| p.to_string()).collect();
        entry
    }

    #[test]
    fn the_one_where_the_second_sighting_is_just_deja_vu() {
        let mut seen = SeenFilter::new();
        assert!(seen.first_sighting(&NodeId::from("a")));
        assert!(!seen.first_sighting(&NodeId::from("a")));
        assert!(seen.first_sighting(&NodeId::from("b")));
        assert_eq!(seen.duplicates(), 1);
        assert_eq!(seen.unique(), 2);
    }

    #[test]
    fn the_one_where_du_files_everything_under_its_top_folder() {
        let mut du = DuCollector::new(false);
        du.collect(&leaf("1", &["photos", "2019"], "beach.jpg", 300, &["ann"]));
        du.collect(&leaf("2", &["photos"], "cat.jpg", 100, &["ann", "bob"]));
        du.collect(&leaf("3", &["docs"], "cv.pdf", 50, &["bob"]));
        du.collect(&leaf("4", &[], "loose.txt", 7, &[]));

        assert_eq!(
            du.by_folder(),
            vec![
                ("docs/".to_string(), 50),
                ("loose.txt".to_string(), 7),
                ("photos/".to_string(), 400),
            ]
        );
        assert_eq!(
            du.by_owner(),
            vec![("ann".to_string(), 400), ("bob".to_string(), 150)]
        );
        assert_eq!(du.total(), 457);
    }

    #[test]
    fn the_one_where_dash_s_puts_the_heavyweights_first() {
        let mut du = DuCollector::new(true);
        du.collect(&leaf("1", &["small"], "a", 1, &[]));
        du.collect(&leaf("2", &["big"], "b", 1000, &[]));
        du.collect(&leaf("3", &["medium"], "c", 10, &[]));

        let keys: Vec<_> = du.by_folder().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["big/", "medium/", "small/"]);
    }

    #[test]
    fn the_one_where_the_du_report_prints_raw_bytes() {
        let mut du = DuCollector::new(false);
        du.collect(&leaf("1", &["docs"], "cv.pdf", 1048576, &["me@example.com"]));
        let report = du.render();

        assert!(report.starts_with("Storage by folder"));
        assert!(report.contains("1048576"));
        assert!(report.contains("docs/"));
        assert!(report.contains("me@example.com"));
        assert!(report.ends_with("Total size: 1048576\n"));
    }

    #[test]
    fn the_one_where_find_lists_paths_in_a_civilised_order() {
        let mut report = Report::Find(FindCollector::new());
        report.collect(&leaf("1", &["b"], "two.txt", 2, &[]));
        report.collect(&leaf("2", &["a", "deep"], "one.txt", 1, &[]));
        report.collect(&leaf("3", &[], "top.txt", 3, &[]));

        assert_eq!(
            report.render(),
            "a/deep/one.txt\nb/two.txt\ntop.txt\nTotal size: 6\n"
        );
    }
}
