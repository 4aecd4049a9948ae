// src/error.rs
// =============================================================================
// Typed errors for the mirror.
//
// Two families:
// - RootError: the configured root URL can't be used at all (fatal, setup time)
// - FetchError: one network/filesystem operation for one URL failed
//
// FetchError knows whether it is worth retrying. Network trouble (timeouts,
// resets, bad status codes) is transient; filesystem trouble (permission
// denied, disk full) is terminal for that file and never retried.
//
// Rust concepts:
// - thiserror: derive Display + Error for our enums
// - #[source]: keeps the underlying error in the chain for debugging
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a root URL is rejected before any crawling starts.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("invalid root URL '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("root URL '{url}' must use http or https")]
    UnsupportedScheme { url: String },

    #[error("root URL '{url}' has no host")]
    MissingHost { url: String },
}

/// A failed network or filesystem operation for a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure, broken body stream...
    #[error("network error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timed out waiting for {url}")]
    Timeout { url: String },

    /// The server answered, but not with a status we accept.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        // reqwest reports its own timeouts as regular errors
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::Status { .. } => true,
            Self::Io { .. } => false,
        }
    }
}
