// src/config.rs
// =============================================================================
// Run configuration.
//
// The CLI gives us raw values (strings, floats). This module validates them
// once and turns them into two things:
// - MirrorConfig: everything one mirror run needs
// - HttpSettings: the HTTP side of it (timeouts, retries, User-Agent), which
//   is handed read-only to the crawler and to every download worker
//
// Rust concepts:
// - Duration: typed time spans instead of bare numbers
// - impl Default: one place for the baked-in defaults
// =============================================================================

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::crawl::RemoteRoot;

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_TIMEOUT_SECS: f64 = 20.0;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_OUT_DIR: &str = "mirror";

pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; site-mirror/{})",
        env!("CARGO_PKG_VERSION")
    )
}

// HTTP behaviour shared by the crawler and all download workers.
// Nothing mutates it after construction.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Applies to connect, listing GETs, HEAD requests, response headers and
    /// each body chunk of a download (so big files are not cut off)
    pub timeout: Duration,
    /// Attempts per operation, always at least 1
    pub retries: u32,
    /// Pause between two attempts of the same operation
    pub retry_delay: Duration,
    /// Politeness pause after each listing fetch and each completed download
    pub delay: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
            delay: Duration::ZERO,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    // Builds the one client every request goes through.
    // reqwest::Client is an Arc inside, so clones share the connection pool.
    pub fn build_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.timeout)
            .build()
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub root: RemoteRoot,
    pub out_dir: PathBuf,
    pub workers: usize,
    pub http: HttpSettings,
    pub show_progress: bool,
}

impl MirrorConfig {
    pub fn new(root: RemoteRoot, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            root,
            out_dir: out_dir.into(),
            workers: DEFAULT_WORKERS,
            http: HttpSettings::default(),
            show_progress: true,
        }
    }

    // Validates the raw CLI values
    //
    // Errors on: bad root URL, zero workers, zero retries,
    // negative / NaN / infinite durations
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = RemoteRoot::parse(&cli.url)?;

        if cli.workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        if cli.retries == 0 {
            return Err(anyhow!("--retries must be at least 1"));
        }

        let mut config = Self::new(root, cli.out.clone());
        config.workers = cli.workers;
        config.show_progress = !cli.no_progress && !cli.quiet;
        config.http = HttpSettings {
            timeout: seconds("--timeout", cli.timeout)?,
            retries: cli.retries,
            retry_delay: seconds("--retry-delay", cli.retry_delay)?,
            delay: seconds("--delay", cli.delay)?,
            user_agent: cli.user_agent.clone(),
        };

        Ok(config)
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} must be a non-negative number of seconds, got {}", flag, value))
}
