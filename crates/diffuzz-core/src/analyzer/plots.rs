//! Plotting for the analyzer: bug count and edge count over time,
//! one line per run, drawn with `plotters`.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AnalyzerError;
use crate::report::Report;

const COLORS: &[RGBColor] = &[RED, BLUE, GREEN, MAGENTA, CYAN, BLACK];

fn color_for(index: usize) -> RGBColor {
    COLORS[index % COLORS.len()]
}

fn to_plot_err(path: &Path, e: impl std::error::Error + Send + Sync + 'static) -> AnalyzerError {
    AnalyzerError::Plotting(path.to_owned(), Box::new(e))
}

/// Cumulative differential count over wall-clock seconds, one series per
/// named run.
pub fn plot_bug_count(path: &Path, runs: &[(String, &Report)]) -> Result<(), AnalyzerError> {
    let root = BitMapBackend::new(path, (960, 540)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| to_plot_err(path, e))?;

    let max_time = runs
        .iter()
        .flat_map(|(_, report)| report.differentials.iter().map(|d| d.time))
        .fold(1.0_f64, f64::max);
    let max_count = runs.iter().map(|(_, report)| report.differentials.len()).max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Differentials over time", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..max_time, 0..(max_count as u64 + 1))
        .map_err(|e| to_plot_err(path, e))?;

    chart
        .configure_mesh()
        .x_desc("time (s)")
        .y_desc("differentials found")
        .draw()
        .map_err(|e| to_plot_err(path, e))?;

    for (index, (name, report)) in runs.iter().enumerate() {
        let color = color_for(index);
        let mut points: Vec<(f64, u64)> = vec![(0.0, 0)];
        for (count, differential) in report.differentials.iter().enumerate() {
            points.push((differential.time, count as u64 + 1));
        }
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(|e| to_plot_err(path, e))?
            .label(name.clone())
            .legend(move |(x, y)| PathElement::new([(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| to_plot_err(path, e))?;
    root.present().map_err(|e| to_plot_err(path, e))?;
    Ok(())
}

/// Cumulative edge count over generation index, one series per (run, target)
/// pair.
pub fn plot_edge_count(path: &Path, runs: &[(String, &Report)]) -> Result<(), AnalyzerError> {
    let root = BitMapBackend::new(path, (960, 540)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| to_plot_err(path, e))?;

    let max_generation = runs
        .iter()
        .flat_map(|(_, report)| report.coverage.values())
        .flat_map(|samples| samples.iter().map(|s| s.generation))
        .max()
        .unwrap_or(0);
    let max_edges = runs
        .iter()
        .flat_map(|(_, report)| report.coverage.values())
        .flat_map(|samples| samples.iter().map(|s| s.edges))
        .max()
        .unwrap_or(1)
        .max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Cumulative edges over generations", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..(max_generation + 1), 0..(max_edges as u64 + 1))
        .map_err(|e| to_plot_err(path, e))?;

    chart
        .configure_mesh()
        .x_desc("generation")
        .y_desc("distinct edges seen")
        .draw()
        .map_err(|e| to_plot_err(path, e))?;

    let mut series_index = 0;
    for (run_name, report) in runs {
        for (target_name, samples) in &report.coverage {
            let color = color_for(series_index);
            series_index += 1;
            let points: Vec<(u64, u64)> = samples.iter().map(|s| (s.generation, s.edges as u64)).collect();
            chart
                .draw_series(LineSeries::new(points, &color))
                .map_err(|e| to_plot_err(path, e))?
                .label(format!("{run_name}/{target_name}"))
                .legend(move |(x, y)| PathElement::new([(x, y), (x + 20, y)], color));
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| to_plot_err(path, e))?;
    root.present().map_err(|e| to_plot_err(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::DifferentialRecord;
    use uuid::Uuid;

    #[test]
    fn plot_bug_count_writes_a_nonempty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bugs.png");
        let mut report = Report::new(Uuid::nil());
        report.differentials.push(DifferentialRecord {
            bytes_base64: String::new(),
            path: "differential_0".into(),
            time: 1.0,
            generation: 0,
        });
        plot_bug_count(&path, &[("run-a".to_owned(), &report)]).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn plot_edge_count_handles_empty_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.png");
        let report = Report::new(Uuid::nil());
        plot_edge_count(&path, &[("run-a".to_owned(), &report)]).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
