use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use kestrel_cli::commands;

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(author, version)]
#[command(
    about = "A CLI harness for measuring browser performance of embedded 3D experiences",
    long_about = "Kestrel drives a Chrome browser against target URLs, waits for the embedded \
                  experience to start rendering, samples frame rate and navigation timing, \
                  records failed requests, and persists one JSON snapshot per URL."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure target URLs and write one snapshot per URL
    Measure {
        /// Target URL (repeatable; overrides PERF_TARGET_URL)
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,

        /// Directory snapshots are written to
        #[arg(long, default_value = "perf-results")]
        results_dir: PathBuf,

        /// Path to the Chrome binary
        #[arg(long)]
        chrome_path: Option<PathBuf>,

        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,

        /// Skip readiness probing and frame-rate sampling
        #[arg(long)]
        no_fps: bool,

        /// FPS sampling window in milliseconds (default 3000, or 1500 when CI is set)
        #[arg(long, value_name = "MS")]
        sample_ms: Option<u64>,

        /// Attempts per URL before reporting it as failed
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Accessible title of the experience iframe
        #[arg(long, default_value = "Experience")]
        iframe_title: String,

        /// Substring a response URL must contain to be recorded as an API call
        #[arg(long, default_value = "/api/")]
        api_filter: String,

        /// Chrome remote debugging port
        #[arg(long, default_value_t = 9222)]
        debug_port: u16,
    },

    /// Render bar charts from persisted snapshots
    Chart {
        /// Directory containing snapshot JSON files
        #[arg(long, default_value = "perf-results")]
        results_dir: PathBuf,

        /// Directory chart images are written to
        #[arg(long, default_value = "perf-graphs")]
        output_dir: PathBuf,
    },

    /// Print a summary of persisted snapshots
    Report {
        /// Directory containing snapshot JSON files
        #[arg(long, default_value = "perf-results")]
        results_dir: PathBuf,

        /// Output format (pretty, json)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Measure {
            urls,
            results_dir,
            chrome_path,
            headed,
            no_fps,
            sample_ms,
            retries,
            iframe_title,
            api_filter,
            debug_port,
        } => commands::measure::execute(commands::measure::MeasureOptions {
            urls,
            results_dir,
            chrome_path,
            headed,
            no_fps,
            sample_ms,
            retries,
            iframe_title,
            api_filter,
            debug_port,
        }),
        Commands::Chart {
            results_dir,
            output_dir,
        } => commands::chart::execute(&results_dir, &output_dir),
        Commands::Report {
            results_dir,
            format,
        } => commands::report::execute(&results_dir, &format),
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("kestrel=debug,kestrel_core=debug,kestrel_browser=debug")
    } else {
        EnvFilter::new("kestrel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
