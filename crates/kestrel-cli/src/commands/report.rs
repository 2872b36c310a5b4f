use anyhow::Result;
use kestrel_core::snapshot::{PerformanceSnapshot, SnapshotReader};
use std::path::Path;

pub fn execute(results_dir: &Path, format: &str) -> Result<()> {
    tracing::info!("Summarizing snapshots in: {}", results_dir.display());

    let snapshots = SnapshotReader::load_dir(results_dir)?;

    match format {
        "json" => output_json(&snapshots)?,
        _ => output_pretty(&snapshots), // "pretty" is default
    }

    Ok(())
}

fn output_pretty(snapshots: &[PerformanceSnapshot]) {
    use console::style;

    println!("\n{}", style("Performance Report").bold().cyan());
    println!("{}", style("==================").cyan());

    for snapshot in snapshots {
        println!("\n{}", style(&snapshot.url).bold());
        println!("  Captured:           {}", snapshot.timestamp);
        println!(
            "  DOM Content Loaded: {:.1} ms",
            snapshot.dom_content_loaded
        );
        println!("  Load Event:         {:.1} ms", snapshot.load_event);

        if let Some(lcp) = snapshot.lcp {
            println!("  LCP:                {:.1} ms", lcp);
        }

        if let (Some(avg), Some(min)) = (snapshot.avg_fps, snapshot.min_fps) {
            println!(
                "  FPS (avg/min):      {}/{} over {} ms",
                avg,
                min,
                snapshot.fps_sample_duration_ms.unwrap_or(0)
            );
        }

        println!("  API Calls:          {}", snapshot.api_calls.len());

        if !snapshot.failed_requests.is_empty() {
            println!(
                "  {}",
                style(format!(
                    "Failed Requests:    {}",
                    snapshot.failed_requests.len()
                ))
                .red()
            );
            for failed in &snapshot.failed_requests {
                match (failed.status, &failed.failure) {
                    (Some(status), _) => {
                        println!("    [{}] {} {}", status, failed.method, failed.url)
                    }
                    (None, Some(reason)) => {
                        println!("    [{}] {} {}", reason, failed.method, failed.url)
                    }
                    (None, None) => println!("    {} {}", failed.method, failed.url),
                }
            }
        }
    }

    println!(); // trailing newline
}

fn output_json(snapshots: &[PerformanceSnapshot]) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshots)?;
    println!("{}", json);
    Ok(())
}
