// src/crawl/queue.rs
// =============================================================================
// This module walks the remote directory tree breadth-first.
//
// How it works:
// 1. Start with the root URL in the pending queue
// 2. Pop a directory, skip it if already visited, otherwise mark it visited
// 3. Fetch its listing and extract in-root links
// 4. Links ending in "/" are directories -> queue them (once)
//    Everything else is a file -> add it to the file set
// 5. Repeat until the queue is empty
//
// There's no depth limit. The visited set is what guarantees we stop, even
// when a listing links back to itself or to a parent inside the root.
//
// Known limitation: a directory linked without its trailing slash looks like
// a file to us, and will be "downloaded" as one.
//
// Politeness:
// - Optional fixed pause after each listing fetch
// - Directories are fetched one at a time, never concurrently
// =============================================================================

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use super::frontier::{FileLinkSet, PendingQueue, VisitedSet};
use super::links::extract_links;
use super::RemoteRoot;
use crate::config::HttpSettings;

pub struct Crawler {
    client: Client,
    root: RemoteRoot,
    http: HttpSettings,
}

impl Crawler {
    pub fn new(client: Client, root: RemoteRoot, http: HttpSettings) -> Self {
        Self { client, root, http }
    }

    // Crawls the whole tree below the root
    //
    // Returns: every file URL discovered (unique, sorted)
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn crawl(&self) -> FileLinkSet {
        let mut pending = PendingQueue::new();
        let mut visited = VisitedSet::new();
        let mut files = FileLinkSet::new();

        pending.push(self.root.as_url().clone());

        while let Some(dir) = pending.pop() {
            if !visited.mark(&dir) {
                continue;
            }

            info!(url = %dir, queued = pending.len(), "Crawling");

            let links = extract_links(&self.client, &dir, &self.root, &self.http).await;

            for link in links {
                if is_directory(&link) {
                    if !visited.contains(&link) && !pending.contains(&link) {
                        pending.push(link);
                    }
                } else if files.insert(link.clone()) {
                    debug!(url = %link, "Found file");
                }
            }

            // Polite crawling: pause between listing requests
            if !self.http.delay.is_zero() {
                tokio::time::sleep(self.http.delay).await;
            }
        }

        info!(
            directories = visited.len(),
            files = files.len(),
            "Crawl finished"
        );

        files
    }
}

// Trailing slash on the path means directory
fn is_directory(url: &Url) -> bool {
    url.path().ends_with('/')
}
