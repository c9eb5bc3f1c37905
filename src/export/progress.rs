//! Progress tracking for export operations
//!
//! Counts pages and records as they are written. The terminal progress bar is
//! only shown by the command-line binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for export operations
pub struct ProgressTracker {
    /// Records written so far
    records: AtomicU64,
    /// Pages written so far
    pages: AtomicU64,
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Total number of records if known (None for unknown)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: Option<u64>, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = match total {
                Some(n) => {
                    let bar = ProgressBar::new(n);
                    let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
                    if let Ok(style) = ProgressStyle::default_bar().template(template) {
                        bar.set_style(style.progress_chars("#>-"));
                    }
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    let template = "{spinner:.green} {pos} records {msg}";
                    if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                        bar.set_style(style);
                    }
                    bar
                }
            };
            Some(bar)
        } else {
            None
        };

        Self {
            records: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Expected record count, once the first page reports it
    pub fn set_total(&self, total: u64) {
        if let Some(ref bar) = self.bar {
            bar.set_length(total);
        }
    }

    /// Record one written page
    ///
    /// # Arguments
    /// * `count` - Number of records in the page
    pub fn page_written(&self, count: u64) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        let records = self.records.fetch_add(count, Ordering::Relaxed) + count;

        if let Some(ref bar) = self.bar {
            bar.set_position(records);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                bar.set_message(format!("({:.0} records/sec)", records as f64 / elapsed));
            }
        }
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn pages(&self) -> u64 {
        self.pages.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts_pages_and_records() {
        let tracker = ProgressTracker::new(Some(30), false);
        tracker.page_written(10);
        tracker.page_written(7);
        assert_eq!(tracker.records(), 17);
        assert_eq!(tracker.pages(), 2);
        tracker.finish();
    }
}
