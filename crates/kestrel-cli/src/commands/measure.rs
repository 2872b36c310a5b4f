use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kestrel_browser::{BrowserSession, ChromeFinder, ChromeLauncher, MetricsSampler, SamplerConfig};
use kestrel_core::snapshot::{PerformanceSnapshot, SnapshotWriter};
use std::path::PathBuf;
use std::time::Duration;

/// Measured when no target is configured anywhere.
pub const DEFAULT_TARGET_URL: &str = "https://experience.example.com/";

const DEFAULT_SAMPLE_MS: u64 = 3000;
const CI_SAMPLE_MS: u64 = 1500;

pub struct MeasureOptions {
    pub urls: Vec<String>,
    pub results_dir: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub headed: bool,
    pub no_fps: bool,
    pub sample_ms: Option<u64>,
    pub retries: u32,
    pub iframe_title: String,
    pub api_filter: String,
    pub debug_port: u16,
}

struct UrlOutcome {
    url: String,
    result: std::result::Result<PathBuf, kestrel_browser::Error>,
}

pub fn execute(options: MeasureOptions) -> Result<()> {
    // Create tokio runtime for async operations
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(options));

    // Explicitly shutdown runtime with timeout to prevent hanging on blocking tasks
    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}

async fn run(options: MeasureOptions) -> Result<()> {
    let urls = resolve_target_urls(&options.urls);
    let window_ms = sample_window_ms(options.sample_ms);

    println!("🔍 Locating Chrome...");
    let finder = ChromeFinder::new(options.chrome_path.clone());
    let chrome_binary = finder.find()?;
    println!("✅ Found Chrome at: {}", chrome_binary.display());

    let launcher = ChromeLauncher::new(chrome_binary, options.debug_port, !options.headed)?;

    println!("🚀 Launching Chrome...");
    let mut chrome_process = launcher.launch()?;

    let session = match BrowserSession::connect(launcher.debugging_port()).await {
        Ok(session) => session,
        Err(e) => {
            let _ = chrome_process.kill();
            let _ = chrome_process.wait();
            return Err(e.into());
        }
    };

    let outcome = drive(&session, &options, &urls, window_ms).await;

    session.close().await;
    let _ = chrome_process.kill();
    let _ = chrome_process.wait();

    let outcomes = outcome?;
    print_summary(&outcomes);

    if !outcomes.is_empty() && outcomes.iter().all(|o| o.result.is_err()) {
        anyhow::bail!("all {} target URL(s) failed", outcomes.len());
    }

    Ok(())
}

async fn drive(
    session: &BrowserSession,
    options: &MeasureOptions,
    urls: &[String],
    window_ms: u64,
) -> Result<Vec<UrlOutcome>> {
    let page = session.page().await?;

    std::fs::create_dir_all(&options.results_dir)?;
    let run_id = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();

    let config = SamplerConfig {
        api_filter: options.api_filter.clone(),
        iframe_title: options.iframe_title.clone(),
        fps_window: Duration::from_millis(window_ms),
        sample_fps: !options.no_fps,
        ..SamplerConfig::default()
    };
    let sampler = MetricsSampler::new(&page, &config);

    println!(
        "📊 Measuring {} target URL(s), FPS window {}ms",
        urls.len(),
        window_ms
    );

    let progress = ProgressBar::new(urls.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let mut outcomes = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        progress.set_message(url.clone());

        let result = match sample_with_retries(&sampler, url, options.retries).await {
            Ok(snapshot) => {
                let path = options
                    .results_dir
                    .join(format!("{}-{}.json", run_id, index));
                SnapshotWriter::to_file(&snapshot, &path)?;
                Ok(path)
            }
            Err(e) => Err(e),
        };

        outcomes.push(UrlOutcome {
            url: url.clone(),
            result,
        });
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(outcomes)
}

/// A structural failure aborts one attempt; the URL gets a bounded number
/// of whole-measurement retries before it is reported as failed.
async fn sample_with_retries(
    sampler: &MetricsSampler<'_>,
    url: &str,
    retries: u32,
) -> kestrel_browser::Result<PerformanceSnapshot> {
    let attempts = retries.max(1);
    let mut attempt = 1;

    loop {
        match sampler.sample(url).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if attempt < attempts => {
                tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_summary(outcomes: &[UrlOutcome]) {
    println!("\n{}", style("Measurement Summary").bold().cyan());
    println!("{}", style("===================").cyan());

    for outcome in outcomes {
        match &outcome.result {
            Ok(path) => println!("  ✅ {} -> {}", outcome.url, path.display()),
            Err(e) => println!("  ❌ {} ({})", outcome.url, e),
        }
    }
    println!();
}

/// Resolve the target URL list: explicit flags first, then the
/// PERF_TARGET_URL environment variable, then the built-in default.
pub fn resolve_target_urls(explicit: &[String]) -> Vec<String> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }

    if let Ok(raw) = std::env::var("PERF_TARGET_URL") {
        let parsed = parse_target_urls(&raw);
        if !parsed.is_empty() {
            return parsed;
        }
    }

    vec![DEFAULT_TARGET_URL.to_string()]
}

/// Split a comma-separated URL list, trimming whitespace and surrounding
/// quotes and dropping empty items.
pub fn parse_target_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|url| {
            url.trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

/// The FPS window: an explicit flag wins, otherwise CI runs get the short
/// window.
pub fn sample_window_ms(flag: Option<u64>) -> u64 {
    if let Some(ms) = flag {
        return ms;
    }
    if std::env::var_os("CI").is_some() {
        CI_SAMPLE_MS
    } else {
        DEFAULT_SAMPLE_MS
    }
}
