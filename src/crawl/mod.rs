// src/crawl/mod.rs
// =============================================================================
// This module discovers what there is to download.
//
// Features:
// - Breadth-first walk over HTML directory listings
// - Strict site boundary: same scheme/host/port, below the root path
// - Each directory fetched at most once per run (cycle safe)
// - Optional polite delay between listing requests
//
// Output: a FileLinkSet, the finished list of file URLs for the mirror phase
// =============================================================================

mod frontier;
mod links;
mod queue;
mod root;

pub use frontier::FileLinkSet;
pub use queue::Crawler;
pub use root::RemoteRoot;
