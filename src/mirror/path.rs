// src/mirror/path.rs
// =============================================================================
// Maps a remote file URL to where it lives on local disk.
//
//   root      = http://x/data/
//   file      = http://x/data/2024/My%20Report.pdf
//   local_dir = ./mirror
//   result    = ./mirror/2024/My Report.pdf
//
// Pure: no I/O, same inputs always give the same path. Creating the parent
// directories is the fetcher's job.
// =============================================================================

use std::path::{Path, PathBuf};
use url::Url;

use crate::crawl::RemoteRoot;

pub fn map_to_local(root: &RemoteRoot, file_url: &Url, local_root: &Path) -> PathBuf {
    let relative = relative_remote_path(root.path(), file_url.path());
    let decoded = urlencoding::decode_binary(relative.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut local = local_root.to_path_buf();
    for segment in decoded.split('/') {
        // "." / ".." can come out of a decoded %2E%2E; never leave local_root
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        local.push(segment);
    }
    local
}

// Strips the root path off the file path. A path that is not below the root
// (shouldn't happen after the boundary check) keeps its full path instead.
fn relative_remote_path<'a>(root_path: &str, file_path: &'a str) -> &'a str {
    match file_path.strip_prefix(root_path) {
        Some(rest) => rest,
        None => file_path.trim_start_matches('/'),
    }
}
