// src/crawl/root.rs
// =============================================================================
// The remote root: the URL we were asked to mirror, and the fence around it.
//
// A discovered link is "inside" when it has the same scheme, host and port
// as the root and its path starts with the root's path. Everything else
// (external sites, parent directories, sibling trees) is outside and gets
// dropped without a word.
//
// The check is done per link, never per page: a listing page can contain
// anything, so nothing it says is trusted.
// =============================================================================

use std::fmt;
use url::Url;

use crate::error::RootError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRoot {
    url: Url,
}

impl RemoteRoot {
    pub fn parse(input: &str) -> Result<Self, RootError> {
        let mut url = Url::parse(input).map_err(|source| RootError::Parse {
            url: input.to_string(),
            source,
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(RootError::UnsupportedScheme {
                url: input.to_string(),
            });
        }
        if url.host_str().is_none() {
            return Err(RootError::MissingHost {
                url: input.to_string(),
            });
        }

        // A fragment never reaches the server
        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// The percent-encoded path prefix every accepted link must start with.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    // Boundary check
    //
    // Returns true if `candidate` is on the same scheme + host + port and
    // below the root path
    pub fn contains(&self, candidate: &Url) -> bool {
        candidate.scheme() == self.url.scheme()
            && candidate.host_str() == self.url.host_str()
            && candidate.port_or_known_default() == self.url.port_or_known_default()
            && candidate.path().starts_with(self.url.path())
    }
}

impl fmt::Display for RemoteRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
