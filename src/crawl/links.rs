// src/crawl/links.rs
// =============================================================================
// This module fetches one directory listing page and pulls links out of it.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is forgiving about broken markup (a bad page just yields fewer links)
//
// What we keep from a listing:
// - every <a href> that resolves to a URL inside the remote root
// What we throw away:
// - "../" and "/" (parent / server root navigation)
// - same-page links ("#top", "?C=N;O=D" column sorting in Apache listings)
// - anything outside the root, silently (external links are normal)
// =============================================================================

use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::{error, trace, warn};
use url::Url;

use super::RemoteRoot;
use crate::config::HttpSettings;
use crate::error::FetchError;

// Fetches a listing page and returns the in-root links it contains
//
// Never fails: a page that can't be fetched is logged and treated as empty,
// so the crawl carries on with the rest of the queue.
pub async fn extract_links(
    client: &Client,
    page_url: &Url,
    root: &RemoteRoot,
    http: &HttpSettings,
) -> BTreeSet<Url> {
    match fetch_listing(client, page_url, http).await {
        Ok(html) => parse_listing(&html, page_url, root),
        Err(e) => {
            error!(url = %page_url, error = %e, "Failed to fetch directory listing");
            BTreeSet::new()
        }
    }
}

// GETs a listing page, retrying server-side and network trouble.
// Client errors (404, 403...) are final right away.
pub async fn fetch_listing(
    client: &Client,
    url: &Url,
    http: &HttpSettings,
) -> Result<String, FetchError> {
    let mut attempt = 1;
    loop {
        match get_listing_once(client, url, http).await {
            Ok(html) => return Ok(html),
            Err(e) if attempt < http.retries && worth_retrying(&e) => {
                warn!(url = %url, attempt, error = %e, "Directory listing fetch failed, retrying");
                tokio::time::sleep(http.retry_delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn get_listing_once(
    client: &Client,
    url: &Url,
    http: &HttpSettings,
) -> Result<String, FetchError> {
    let response = client
        .get(url.clone())
        .timeout(http.timeout)
        .send()
        .await
        .map_err(|e| FetchError::transport(url.as_str(), e))?;

    if response.status() != StatusCode::OK {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::transport(url.as_str(), e))
}

fn worth_retrying(err: &FetchError) -> bool {
    match err {
        FetchError::Status { status, .. } => {
            *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        }
        other => other.is_transient(),
    }
}

// Extracts the in-root links from listing HTML
//
// Parameters:
//   html: the page body
//   page_url: where the page came from (relative hrefs resolve against it)
//   root: the boundary every returned link must satisfy
//
// Returns: a set, so a file linked twice on one page shows up once
pub fn parse_listing(html: &str, page_url: &Url, root: &RemoteRoot) -> BTreeSet<Url> {
    let document = Html::parse_document(html);

    // Constant selector, known to be valid
    let selector = Selector::parse("a[href]").expect("static selector");

    let mut links = BTreeSet::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_href(page_url, href) else {
            continue;
        };

        if root.contains(&link) {
            links.insert(link);
        } else {
            trace!(link = %link, "Dropping link outside the mirror root");
        }
    }

    links
}

// Resolves one href against the page URL
//
// Returns None for hrefs we never follow, or that don't parse
fn resolve_href(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href == "../" || href == "/" {
        return None;
    }

    // Same-page navigation, not a file or a directory
    if href.starts_with('#') || href.starts_with('?') {
        return None;
    }

    let mut url = page_url.join(href).ok()?;
    url.set_fragment(None);
    Some(url)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is `let ... else`?
//    - `let Some(x) = expr else { continue; };` binds x if the pattern matches
//    - Otherwise the else block runs, and it must leave the scope
//      (return, continue, break)
//    - Keeps the happy path un-indented
//
// 2. Why BTreeSet instead of HashSet?
//    - Both remove duplicates
//    - BTreeSet also keeps items sorted, so the crawl order is the same
//      every time we run against the same server
//
// 3. Why is parse_listing not async?
//    - scraper's Html type can't be sent between threads
//    - Keeping all HTML work inside a plain function means it never lives
//      across an .await point
// -----------------------------------------------------------------------------
