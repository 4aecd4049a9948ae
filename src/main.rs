// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing) based on -v / -q / RUST_LOG
// 3. Validate the arguments into a MirrorConfig
// 4. Run the mirror and print the summary
// 5. Exit with proper code (0 = run completed, 1 = failures with --strict,
//    2 = setup error)
//
// Individual file failures don't change the exit code unless --strict is
// given; they're listed in the summary instead.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - defaults, validation, HTTP client settings
mod crawl; // src/crawl/ - directory listing traversal
mod error; // src/error.rs - typed errors
mod mirror; // src/mirror/ - path mapping, downloads, the run itself

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::MirrorConfig;
use mirror::Summary;

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    // Parse first, so --help and --version work without any log setup
    let cli = Cli::parse();
    init_logging(&cli);

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            // Setup went wrong (bad URL, unwritable output dir...)
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise -q / -v decide
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<i32> {
    let config = MirrorConfig::from_cli(cli)?;
    debug!(?config, "Configuration");

    println!("🔍 Mirroring: {}", config.root);
    println!("📁 Into: {}", config.out_dir.display());

    let summary = mirror::run(&config).await?;

    print_summary(&summary, cli.json)?;

    if cli.strict && summary.has_failures() {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Prints the summary either as a table or JSON
fn print_summary(summary: &Summary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
        return Ok(());
    }

    if !summary.failures.is_empty() {
        println!();
        println!("{:<60} {:<40}", "FAILED URL", "ERROR");
        println!("{}", "=".repeat(100));
        for failure in &summary.failures {
            println!("{:<60} {:<40}", truncate(&failure.url, 57), failure.error);
        }
    }

    println!();
    println!("📊 Summary:");
    println!("   ⬇️  Downloaded: {}", summary.downloaded);
    println!("   ⏭️  Skipped: {}", summary.skipped);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   📋 Total: {}", summary.total);
    Ok(())
}

// Shortens long URLs for the table, on a char boundary
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut)
}
