// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Every knob of a mirror run has a flag here, with the defaults baked in
// (see config.rs for the constants and the validation step).
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

use crate::config::{
    default_user_agent, DEFAULT_OUT_DIR, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS,
};

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Mirror an HTTP directory listing to local disk",
    long_about = "site-mirror walks a web server's auto-generated directory listings below a root URL, \
                  rebuilds the directory tree locally and downloads every file once. Files whose local \
                  size already matches the remote size are skipped, so re-running after an interruption is safe."
)]
pub struct Cli {
    /// Directory URL to mirror (e.g., http://example.com/data/)
    ///
    /// Only links on the same host and below this path are followed
    #[arg(short, long)]
    pub url: String,

    /// Local output root directory
    #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,

    /// Number of concurrent downloads
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Network timeout in seconds (connect, headers, and each body read)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: f64,

    /// Attempts per request before giving up on it
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Seconds to wait between two attempts of the same request
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: f64,

    /// Politeness pause in seconds after each listing page and each download
    #[arg(long, default_value_t = 0.0)]
    pub delay: f64,

    /// User-Agent header sent with every request
    #[arg(long, default_value_t = default_user_agent())]
    pub user_agent: String,

    /// Print the final summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Don't draw the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Exit with code 1 if any file failed to download
    ///
    /// By default the exit code is 0 whenever the run completes;
    /// failures are only reported in the summary
    #[arg(long)]
    pub strict: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    // RUST_LOG still wins over this (see main.rs)
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["site-mirror"]).is_err());
    }

    #[test]
    fn test_short_flags() {
        let cli =
            Cli::try_parse_from(["site-mirror", "-u", "http://x/a/", "-o", "out", "-w", "3"])
                .unwrap();
        assert_eq!(cli.url, "http://x/a/");
        assert_eq!(cli.out, PathBuf::from("out"));
        assert_eq!(cli.workers, 3);
        assert!(!cli.strict);
        assert!(!cli.json);
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::try_parse_from(["site-mirror", "-u", "http://x/"]).unwrap();
        assert_eq!(cli.log_level(), "info");

        let cli = Cli::try_parse_from(["site-mirror", "-u", "http://x/", "-vv"]).unwrap();
        assert_eq!(cli.log_level(), "trace");

        let cli = Cli::try_parse_from(["site-mirror", "-u", "http://x/", "-q"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["site-mirror", "-u", "http://x/", "-q", "-v"]).is_err());
    }
}
