use anyhow::Result;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::benchmark::EvaluationReport;

pub fn generate_plots(reports: &[EvaluationReport], output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("metrics_comparison.png");
    plot_metric_comparison(reports, &path)?;
    Ok(path)
}

/// Grouped bars: one group per test set, correctness and relevancy side by side.
fn plot_metric_comparison(reports: &[EvaluationReport], path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let groups = reports.len().max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption("Mean Answer Metrics by Method", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..groups, 0f64..1.0f64)?;

    let labels: Vec<String> = reports.iter().map(|r| r.label.clone()).collect();
    chart
        .configure_mesh()
        .y_desc("Score")
        .x_labels(reports.len().max(1))
        .x_label_formatter(&|x| {
            let index = x.floor() as usize;
            labels.get(index).cloned().unwrap_or_default()
        })
        .disable_x_mesh()
        .draw()?;

    let bars = reports.iter().enumerate();
    chart
        .draw_series(bars.clone().map(|(i, report)| {
            Rectangle::new(
                [
                    (i as f64 + 0.15, 0.0),
                    (i as f64 + 0.5, report.answer_correctness.mean),
                ],
                BLUE.filled(),
            )
        }))?
        .label("answer_correctness")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], BLUE.filled()));

    chart
        .draw_series(bars.map(|(i, report)| {
            Rectangle::new(
                [
                    (i as f64 + 0.5, 0.0),
                    (i as f64 + 0.85, report.answer_relevancy.mean),
                ],
                GREEN.filled(),
            )
        }))?
        .label("answer_relevancy")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], GREEN.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!(path = %path.display(), "Saved metrics plot");
    Ok(())
}
