//! 📊 progress.rs: "Are we there yet?" For a walk, nobody knows. So we count instead.
//!
//! 🚀 A tree walk has no known total, so there's no bar to fill. There's a spinner, a leaf
//! count, a byte count and a rate. Watching it will not make it go faster. We've tried.
//!
//! 🦆 The spinner draws on stderr, so stdout stays clean for the report.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// ⏱️ MM:SS, or HH:MM:SS for the truly patient.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🌀 Live discovery counters for one walk.
pub(crate) struct WalkProgress {
    spinner: ProgressBar,
    leaves: u64,
    bytes: u64,
    failures: u64,
    duplicates: u64,
    start_time: Instant,
}

impl std::fmt::Debug for WalkProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar doesn't Debug, the counters do
        f.debug_struct("WalkProgress")
            .field("leaves", &self.leaves)
            .field("bytes", &self.bytes)
            .field("failures", &self.failures)
            .field("duplicates", &self.duplicates)
            .finish()
    }
}

impl WalkProgress {
    /// `visible = false` gives a hidden spinner: same counters, no drawing.
    pub(crate) fn new(visible: bool) -> Self {
        let spinner = if visible {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        } else {
            ProgressBar::hidden()
        };
        Self {
            spinner,
            leaves: 0,
            bytes: 0,
            failures: 0,
            duplicates: 0,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_leaf(&mut self, size: u64) {
        self.leaves += 1;
        self.bytes += size;
        self.render();
    }

    pub(crate) fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures += 1;
        self.render();
    }

    pub(crate) fn leaves_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.leaves as f64 / elapsed
        } else {
            0.0
        }
    }

    fn message(&self) -> String {
        let mut message = format!(
            "{} leaves, {} bytes, {:.0} leaves/s, {} elapsed",
            self.leaves,
            self.bytes,
            self.leaves_per_sec(),
            format_duration(self.start_time.elapsed())
        );
        if self.failures > 0 {
            message.push_str(&format!(", {} failed", self.failures));
        }
        message
    }

    fn render(&self) {
        if !self.spinner.is_hidden() {
            self.spinner.set_message(self.message());
        }
    }

    /// ✅ Stop spinning and clear the line so the report prints on a clean slate.
    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_durations_grow_an_hours_column_when_needed() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn the_one_where_a_hidden_spinner_still_keeps_count() {
        let mut progress = WalkProgress::new(false);
        progress.record_leaf(10);
        progress.record_leaf(32);
        progress.record_failure();
        progress.record_duplicate();

        let message = progress.message();
        assert!(message.starts_with("2 leaves, 42 bytes"));
        assert!(message.ends_with(", 1 failed"));
        assert_eq!(progress.duplicates, 1);
        progress.finish();
    }
}
