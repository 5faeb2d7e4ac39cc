use std::path::PathBuf;

use anyhow::{Context, bail};
use diffuzz_core::analyzer::{self, OverlapRow, plots, queue};
use diffuzz_core::{Config, Report};
use indexmap::IndexMap;
use tracing::info;

use super::GlobalOptions;

/// Replays queued runs of the fuzzer binary and reports on the results:
/// bug-count-over-time, edge-count-over-generation, and cross-run overlap.
#[derive(Debug, clap::Parser)]
pub(super) struct AnalyzeCommand {
    /// Human-readable label for this analysis, used only in log output.
    name: String,

    /// CSV file of `name,commit,timeout_seconds[,config_file]` rows.
    queue_file: PathBuf,

    /// Plot cumulative differential count over wall-clock time.
    #[clap(long)]
    bug_count: bool,

    /// Plot cumulative edge count over generation index, per target.
    #[clap(long)]
    edge_count: bool,

    /// Report, for every subset of queued runs, how many differential
    /// fingerprints are common to that subset.
    #[clap(long)]
    bug_overlap: bool,

    /// Config file that the fuzzer binary reads `results_dir`/`reports_dir`
    /// from, and that `config_file` rows get swapped into before each run.
    #[clap(long, default_value = "diffuzz.toml")]
    config: PathBuf,

    /// Path to the `diffuzz` fuzzer binary to invoke for each queued run.
    #[clap(long, default_value = "diffuzz")]
    fuzzer_binary: PathBuf,

    /// Root directory under which this analysis's artifacts are written.
    #[clap(long, default_value = "analyses")]
    analyses_dir: PathBuf,
}

impl AnalyzeCommand {
    pub(super) fn run(self, _global_options: &GlobalOptions) -> anyhow::Result<()> {
        if !(self.bug_count || self.edge_count || self.bug_overlap) {
            bail!("at least one of --bug-count, --edge-count, --bug-overlap is required");
        }

        let config = Config::load(&self.config).context("loading config")?;
        let queued_runs = queue::parse_queue_file(&self.queue_file).context("parsing queue file")?;
        info!(name = %self.name, runs = queued_runs.len(), "executing queued runs");

        let uuids_to_names =
            queue::execute_runs(&queued_runs, &self.fuzzer_binary, &self.config).context("executing queued runs")?;

        let reports: IndexMap<String, Report> = uuids_to_names
            .into_iter()
            .map(|(uuid, name)| {
                let report = analyzer::load_report(&config.reports_dir, &config.results_dir, &uuid)?;
                Ok::<_, anyhow::Error>((name, report))
            })
            .collect::<Result<_, _>>()?;

        let (_analysis_uuid, analysis_dir) =
            analyzer::new_analysis_dir(&self.analyses_dir).context("creating analysis directory")?;

        let report_refs: Vec<(String, &Report)> = reports.iter().map(|(name, report)| (name.clone(), report)).collect();

        if self.bug_count {
            let path = analysis_dir.join("bug_graph.png");
            plots::plot_bug_count(&path, &report_refs).context("plotting bug count")?;
            info!(path = %path.display(), "wrote bug count plot");
        }

        if self.edge_count {
            let path = analysis_dir.join("edges.png");
            plots::plot_edge_count(&path, &report_refs).context("plotting edge count")?;
            info!(path = %path.display(), "wrote edge count plot");
        }

        if self.bug_overlap {
            let mut fingerprinted_runs = IndexMap::new();
            for (name, report) in &reports {
                let byte_differentials: Vec<Vec<u8>> = report
                    .differentials
                    .iter()
                    .filter_map(|d| std::fs::read(&d.path).ok())
                    .collect();
                let scratch_dir = self.analyses_dir.join(format!("trace-{name}"));
                let traced = analyzer::trace_byte_differentials(
                    &scratch_dir,
                    &byte_differentials,
                    &config.targets,
                    config.timeout_ms,
                )?;
                fingerprinted_runs.insert(name.clone(), traced);
            }
            let rows = analyzer::build_overlap_report(&fingerprinted_runs);
            let path = analysis_dir.join("overlap_machine.csv");
            analyzer::write_overlap_csv(&path, &rows).context("writing overlap report")?;
            log_overlap_examples(&rows);
            info!(path = %path.display(), "wrote bug overlap report");
        }

        Ok(())
    }
}

/// Prints one example witness per overlap row to stderr, per the analyzer's
/// external contract: the CSV carries the counts, stderr carries bytes a
/// human can look at without opening the results directory.
fn log_overlap_examples(rows: &[OverlapRow]) {
    for row in rows {
        match &row.example_bytes {
            Some(bytes) => eprintln!("{}: {} common, e.g. {:?}", row.combo_name, row.common_count, String::from_utf8_lossy(bytes)),
            None => eprintln!("{}: 0 common", row.combo_name),
        }
    }
}
