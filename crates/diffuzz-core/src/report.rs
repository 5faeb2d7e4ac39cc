//! Report and result persistence.
//!
//! A run directory named by a fresh UUID holds the minimized differential
//! bytes; a sibling report JSON captures differential metadata and
//! per-target cumulative coverage samples. Writes go through a temp file
//! plus rename so a crash leaves either a well-formed report or none.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReportError;
use crate::model::CoverageSample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialRecord {
    /// The minimized differential's bytes, base64-encoded so they survive
    /// JSON round-tripping regardless of content.
    pub bytes_base64: String,
    pub path: PathBuf,
    pub time: f64,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub uuid: Uuid,
    pub differentials: Vec<DifferentialRecord>,
    pub coverage: IndexMap<String, Vec<CoverageSample>>,
}

impl Report {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            differentials: Vec::new(),
            coverage: IndexMap::new(),
        }
    }
}

/// Owns the on-disk layout for one fuzzing run: `results/<uuid>/` for
/// differential bytes, `reports/<uuid>.json` for the report.
#[derive(Debug)]
pub struct RunDir {
    pub uuid: Uuid,
    results_dir: PathBuf,
    reports_dir: PathBuf,
}

impl RunDir {
    pub fn create(results_root: &Path, reports_root: &Path, uuid: Uuid) -> Result<Self, ReportError> {
        let results_dir = results_root.join(uuid.to_string());
        std::fs::create_dir_all(&results_dir).map_err(|e| ReportError::RunDirIo(results_dir.clone(), e))?;
        Ok(Self {
            uuid,
            results_dir,
            reports_dir: reports_root.to_owned(),
        })
    }

    /// Writes one minimized differential as `differential_<k>`, returning
    /// the path it was written to (relative to the results root).
    pub fn write_differential(&self, index: usize, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        let path = self.results_dir.join(format!("differential_{index}"));
        write_atomically(&path, bytes).map_err(|e| ReportError::DifferentialWriteIo(path.clone(), e))?;
        Ok(path)
    }

    pub fn write_report(&self, report: &Report) -> Result<PathBuf, ReportError> {
        let path = self.reports_dir.join(format!("{}.json", self.uuid));
        let json = serde_json::to_vec_pretty(report).map_err(ReportError::Serialize)?;
        write_atomically(&path, &json).map_err(|e| ReportError::ReportWriteIo(path.clone(), e))?;
        Ok(path)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_differential_then_report_round_trips() {
        let results_root = tempfile::tempdir().unwrap();
        let reports_root = tempfile::tempdir().unwrap();
        let uuid = Uuid::nil();
        let run = RunDir::create(results_root.path(), reports_root.path(), uuid).unwrap();
        let path = run.write_differential(0, b"bug bytes").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bug bytes".to_vec());

        let mut report = Report::new(uuid);
        report.differentials.push(DifferentialRecord {
            bytes_base64: BASE64.encode(b"bug bytes"),
            path,
            time: 1.5,
            generation: 2,
        });
        let report_path = run.write_report(&report).unwrap();
        let reread: Report = serde_json::from_slice(&std::fs::read(report_path).unwrap()).unwrap();
        assert_eq!(reread.differentials.len(), 1);
        assert_eq!(reread.uuid, uuid);
        assert_eq!(BASE64.decode(&reread.differentials[0].bytes_base64).unwrap(), b"bug bytes".to_vec());
    }

    #[test]
    fn write_atomically_never_leaves_a_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_atomically(&path, b"hello").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
