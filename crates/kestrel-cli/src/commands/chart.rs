use anyhow::Result;
use kestrel_core::report::{Metric, MetricSeries, collect_series};
use kestrel_core::snapshot::SnapshotReader;
use plotters::prelude::*;
use std::path::Path;

const CHART_WIDTH: u32 = 1200;
const CHART_HEIGHT: u32 = 600;
const BAR_COLOR: RGBColor = RGBColor(54, 162, 235);

pub fn execute(results_dir: &Path, output_dir: &Path) -> Result<()> {
    tracing::info!("Rendering charts from: {}", results_dir.display());

    // Loading must succeed before anything is written: a missing or empty
    // results directory fails without touching the output directory.
    let snapshots = SnapshotReader::load_dir(results_dir)?;
    println!(
        "📈 Found {} snapshot(s) in {}",
        snapshots.len(),
        results_dir.display()
    );

    std::fs::create_dir_all(output_dir)?;

    for metric in Metric::ALL {
        let series = collect_series(&snapshots, metric);
        let out_path = output_dir.join(metric.file_name());
        render_bar_chart(&series, &out_path)?;
        println!("✅ Graph written: {}", out_path.display());
    }

    Ok(())
}

fn render_bar_chart(series: &MetricSeries, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = series.values.iter().cloned().fold(0.0_f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };
    let bars = series.values.len() as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption(series.metric.title(), ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d((0..bars).into_segmented(), 0.0..y_max)?;

    let labels = &series.labels;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|position| match position {
            SegmentValue::CenterOf(index) => labels
                .get(*index as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        })
        .y_desc(series.metric.title())
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BAR_COLOR.mix(0.6).filled())
            .data(
                series
                    .values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| (index as i32, *value)),
            ),
    )?;

    root.present()?;

    tracing::debug!("Rendered {} to {}", series.metric.title(), path.display());
    Ok(())
}
