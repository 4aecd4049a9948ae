// src/mirror/mod.rs
// =============================================================================
// This module turns a list of remote file URLs into files on disk.
//
// Submodules:
// - path:     remote URL -> local path (pure)
// - fetch:    one file: HEAD size check, skip-if-same-size, atomic download, retries
// - progress: shared counters + progress bar
// - runner:   the whole run (crawl, then the bounded download pool)
// =============================================================================

mod fetch;
mod path;
mod progress;
mod runner;

pub use runner::{run, Summary};
