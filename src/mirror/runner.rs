// src/mirror/runner.rs
// =============================================================================
// Runs one full mirror: crawl, then download everything that was found.
//
// 1. Make sure the local root exists
// 2. Crawl the remote tree to completion (sequential, one listing at a time)
// 3. Map every file URL to its local path, one URL per path
// 4. Download with at most `workers` files in flight at once
// 5. Tally outcomes as they complete (completion order, not list order)
//
// Mapping is not one-to-one ("f.bin?v=1" and "f.bin?v=2" both land on
// f.bin), so jobs are deduplicated by local path before the fan-out. After
// that no two workers share a destination and need no locking; the only
// shared state is the progress counters, which are atomic.
//
// Rust concepts:
// - Streams: stream::iter + buffer_unordered is our bounded worker pool
// - Serialize: the Summary can be printed as JSON
// =============================================================================

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};
use url::Url;

use super::fetch::{DownloadOutcome, Fetcher};
use super::path::map_to_local;
use super::progress::Progress;
use crate::config::MirrorConfig;
use crate::crawl::{Crawler, FileLinkSet};

// Final tally of a run
#[derive(Debug, Default, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One entry per failed file, in completion order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub url: String,
    pub path: PathBuf,
    pub error: String,
}

impl Summary {
    fn record(&mut self, url: &Url, path: PathBuf, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { .. } => self.downloaded += 1,
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Failed(e) => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    url: url.to_string(),
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

// Mirrors config.root into config.out_dir
//
// Returns Err only for setup problems (local root can't be created, HTTP
// client can't be built). Individual file failures end up in the Summary.
pub async fn run(config: &MirrorConfig) -> Result<Summary> {
    tokio::fs::create_dir_all(&config.out_dir)
        .await
        .with_context(|| format!("failed to create {}", config.out_dir.display()))?;

    let client = config
        .http
        .build_client()
        .context("failed to build HTTP client")?;

    info!(root = %config.root, out = %config.out_dir.display(), "Start crawling");
    let crawler = Crawler::new(client.clone(), config.root.clone(), config.http.clone());
    let files = crawler.crawl().await;
    if files.is_empty() {
        info!("No files found below the root");
    } else {
        info!(files = files.len(), "Found files to consider");
    }

    let jobs = plan_jobs(config, &files);

    let mut summary = Summary {
        total: jobs.len(),
        ..Summary::default()
    };

    let progress = Progress::new(jobs.len() as u64, config.show_progress);
    let fetcher = Fetcher::new(client, config.http.clone());

    // References are Copy, so each job's future borrows the shared fetcher
    // and progress instead of cloning them
    let fetcher = &fetcher;
    let progress_ref = &progress;
    let mut completed = stream::iter(jobs)
        .map(move |(url, path)| async move {
            let outcome = fetcher.fetch(&url, &path, progress_ref).await;
            (url, path, outcome)
        })
        .buffer_unordered(config.workers.max(1));

    while let Some((url, path, outcome)) = completed.next().await {
        summary.record(&url, path, outcome);
    }

    progress.finish();
    info!(
        completed = progress.completed(),
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "Done"
    );

    Ok(summary)
}

// Pairs each file URL with its local path. The file set is sorted, so when
// several URLs map to the same path the first in URL order wins, every run.
fn plan_jobs(config: &MirrorConfig, files: &FileLinkSet) -> Vec<(Url, PathBuf)> {
    let mut taken = HashSet::with_capacity(files.len());
    let mut jobs = Vec::with_capacity(files.len());

    for url in files.iter() {
        let path = map_to_local(&config.root, url, &config.out_dir);
        if !taken.insert(path.clone()) {
            warn!(
                url = %url,
                path = %path.display(),
                "Another URL already maps to this local path, skipping"
            );
            continue;
        }
        jobs.push((url.clone(), path));
    }

    jobs
}
