//! The analyzer. Independent of the fuzzing loop: replays
//! persisted differentials through the tracer adapter and compares runs.

pub mod plots;
pub mod queue;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::AnalyzerError;
use crate::model::{EdgeSet, Fingerprint};
use crate::report::Report;
use crate::tracer;

/// Loads the persisted report for one run UUID, verifying its results
/// directory also exists.
pub fn load_report(reports_dir: &Path, results_dir: &Path, run_uuid: &str) -> Result<Report, AnalyzerError> {
    let report_path = reports_dir.join(format!("{run_uuid}.json"));
    if !report_path.is_file() {
        return Err(AnalyzerError::MissingReport(run_uuid.to_owned()));
    }
    if !results_dir.join(run_uuid).is_dir() {
        return Err(AnalyzerError::MissingResultsDir(run_uuid.to_owned()));
    }
    let raw = std::fs::read(&report_path).map_err(|e| AnalyzerError::MissingReport(format!("{run_uuid}: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| AnalyzerError::ReportUnparseable(run_uuid.to_owned(), e))
}

/// Reads every `differential_*` file under `results_dir/<run_uuid>/`.
pub fn read_byte_differentials(results_dir: &Path, run_uuid: &str) -> std::io::Result<Vec<Vec<u8>>> {
    let dir = results_dir.join(run_uuid);
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        out.push(std::fs::read(entry?.path())?);
    }
    Ok(out)
}

/// Re-traces a run's persisted differentials through the tracer adapter,
/// independent of whatever instrumentation existed when the run was
/// performed. Returns a map from fingerprint to one example byte string.
pub fn trace_byte_differentials(
    scratch_dir: &Path,
    byte_differentials: &[Vec<u8>],
    targets: &[crate::model::TargetConfig],
    timeout_ms: u64,
) -> Result<IndexMap<Fingerprint, Vec<u8>>, AnalyzerError> {
    let edge_sets = tracer::trace_batch(scratch_dir, byte_differentials, targets, timeout_ms)
        .unwrap_or_else(|_| vec![vec![EdgeSet::empty(); targets.len()]; byte_differentials.len()]);
    Ok(edge_sets
        .into_iter()
        .zip(byte_differentials.iter().cloned())
        .map(|(edges, bytes)| (Fingerprint::new(edges), bytes))
        .collect())
}

/// One row of the overlap report: which runs' names are included (ordered,
/// joined with `/`), and how many minimized-differential fingerprints are
/// common to exactly that subset.
#[derive(Debug, Clone)]
pub struct OverlapRow {
    pub combo_name: String,
    pub common_count: usize,
    /// Bytes of one fingerprint common to the whole subset, drawn from the
    /// first (in subset order) run that witnessed it — empty if the subset's
    /// intersection is empty.
    pub example_bytes: Option<Vec<u8>>,
}

/// Computes, for every nonempty subset of `runs` (largest-first), the count
/// of fingerprints common to every run in that subset, plus one example
/// input bytes per fingerprint across all runs.
pub fn build_overlap_report(runs: &IndexMap<String, IndexMap<Fingerprint, Vec<u8>>>) -> Vec<OverlapRow> {
    let run_names: Vec<&String> = runs.keys().collect();
    let mut subsets: Vec<Vec<usize>> = (0..(1u32 << run_names.len()))
        .map(|mask| (0..run_names.len()).filter(|i| mask & (1 << i) != 0).collect())
        .filter(|subset: &Vec<usize>| !subset.is_empty())
        .collect();
    subsets.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut rows = Vec::with_capacity(subsets.len());
    for subset in &subsets {
        let combo_name = subset.iter().map(|&i| run_names[i].as_str()).collect::<Vec<_>>().join("/");
        let mut common: Option<HashSet<&Fingerprint>> = None;
        for &i in subset {
            let keys: HashSet<&Fingerprint> = runs[run_names[i]].keys().collect();
            common = Some(match common {
                None => keys,
                Some(acc) => acc.intersection(&keys).copied().collect(),
            });
        }
        let common = common.unwrap_or_default();
        let count = common.len();
        // First-seen occurrence: walk the subset's runs in order and take
        // the example bytes from whichever one names a common fingerprint
        // first.
        let example_bytes = subset.iter().find_map(|&i| {
            let run = &runs[run_names[i]];
            common.iter().find_map(|fp| run.get(*fp)).cloned()
        });
        rows.push(OverlapRow {
            combo_name,
            common_count: count,
            example_bytes,
        });
    }

    rows
}

/// Writes the overlap report as CSV: `Included runs,Common bug count`.
pub fn write_overlap_csv(path: &Path, rows: &[OverlapRow]) -> Result<(), AnalyzerError> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| AnalyzerError::Plotting(path.to_owned(), Box::new(e)))?;
    writer
        .write_record(["Included runs", "Common bug count"])
        .map_err(|e| AnalyzerError::Plotting(path.to_owned(), Box::new(e)))?;
    for row in rows {
        writer
            .write_record([row.combo_name.as_str(), &row.common_count.to_string()])
            .map_err(|e| AnalyzerError::Plotting(path.to_owned(), Box::new(e)))?;
    }
    writer.flush().map_err(|e| AnalyzerError::Plotting(path.to_owned(), e.into()))?;
    Ok(())
}

/// Creates a fresh `analyses/<uuid>/` directory under `analyses_root`.
pub fn new_analysis_dir(analyses_root: &Path) -> std::io::Result<(Uuid, PathBuf)> {
    let uuid = Uuid::new_v4();
    let dir = analyses_root.join(uuid.to_string());
    std::fs::create_dir_all(&dir)?;
    Ok((uuid, dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(edges: &[u32]) -> Fingerprint {
        Fingerprint::new(vec![EdgeSet::from_edges(edges.iter().copied())])
    }

    #[test]
    fn overlap_of_two_runs_with_partial_overlap() {
        let mut r1 = IndexMap::new();
        r1.insert(fp(&[1]), b"f1".to_vec());
        r1.insert(fp(&[2]), b"f2".to_vec());
        r1.insert(fp(&[3]), b"f3".to_vec());
        let mut r2 = IndexMap::new();
        r2.insert(fp(&[2]), b"f2".to_vec());
        r2.insert(fp(&[3]), b"f3".to_vec());
        r2.insert(fp(&[4]), b"f4".to_vec());

        let mut runs = IndexMap::new();
        runs.insert("R1".to_owned(), r1);
        runs.insert("R2".to_owned(), r2);

        let rows = build_overlap_report(&runs);
        let by_name: IndexMap<&str, usize> = rows.iter().map(|r| (r.combo_name.as_str(), r.common_count)).collect();
        assert_eq!(by_name["R1/R2"], 2);
        assert_eq!(by_name["R1"], 3);
        assert_eq!(by_name["R2"], 3);
    }

    #[test]
    fn overlap_rows_are_ordered_largest_subset_first() {
        let mut r1 = IndexMap::new();
        r1.insert(fp(&[1]), b"f1".to_vec());
        let mut r2 = IndexMap::new();
        r2.insert(fp(&[1]), b"f1".to_vec());
        let mut runs = IndexMap::new();
        runs.insert("a".to_owned(), r1);
        runs.insert("b".to_owned(), r2);
        let rows = build_overlap_report(&runs);
        assert_eq!(rows[0].combo_name, "a/b");
    }
}
