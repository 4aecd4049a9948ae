// src/mirror/progress.rs
// =============================================================================
// Live progress for the download phase.
//
// Workers report here once per file, whatever happened to it. Counters are
// atomics so any number of workers can record at the same time without a
// lock; the bar itself (indicatif) is already safe to share.
// =============================================================================

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

use super::fetch::DownloadOutcome;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}";

pub struct Progress {
    bar: ProgressBar,
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Progress {
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-");
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            downloaded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Counts one finished file.
    pub fn record(&self, outcome: &DownloadOutcome) {
        let counter = match outcome {
            DownloadOutcome::Downloaded { .. } => &self.downloaded,
            DownloadOutcome::Skipped => &self.skipped,
            DownloadOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.bar.set_message(format!(
            "(new {}, skipped {}, failed {})",
            self.downloaded.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        ));
        self.bar.inc(1);
    }

    pub fn completed(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
            + self.skipped.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}
