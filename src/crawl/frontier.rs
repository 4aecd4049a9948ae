// src/crawl/frontier.rs
// =============================================================================
// The crawl's bookkeeping, as three separate types:
//
// - PendingQueue: directories waiting to be fetched, FIFO, and never holding
//   the same URL twice
// - VisitedSet:   directories already fetched during this run
// - FileLinkSet:  the files found so far, i.e. the crawl's output
//
// Keeping the queue and the seen-set apart (instead of one "seen" set for
// both) is what makes "enqueue once, visit once" easy to check.
// =============================================================================

use std::collections::{BTreeSet, HashSet, VecDeque};
use url::Url;

#[derive(Debug, Default)]
pub struct PendingQueue {
    order: VecDeque<Url>,
    queued: HashSet<Url>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `url` unless it is already waiting. Returns whether it was added.
    pub fn push(&mut self, url: Url) -> bool {
        if self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.order.push_back(url);
        true
    }

    pub fn pop(&mut self) -> Option<Url> {
        let url = self.order.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.queued.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<Url>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` visited. Returns false if it already was.
    pub fn mark(&mut self, url: &Url) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.clone())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

// Ordered so that the download list (and its logs) come out the same on
// every run against the same tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileLinkSet {
    files: BTreeSet<Url>,
}

impl FileLinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: Url) -> bool {
        self.files.insert(url)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.files.iter()
    }
}
