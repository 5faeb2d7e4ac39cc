//! The analyzer's run-queue driver: reads a CSV queue file of
//! `(name, commit, timeout_seconds[, config_file])` rows and, for each row,
//! checks out the named commit, swaps in the named config file, invokes the
//! fuzzer binary under a timeout that sends a graceful interrupt, and
//! records the run UUID it printed on stdout.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{info, instrument, warn};

use crate::error::AnalyzerError;

#[derive(Debug, Clone)]
pub struct QueuedRun {
    pub name: String,
    pub commit: Option<String>,
    pub timeout: Duration,
    pub config: Option<PathBuf>,
}

pub fn parse_queue_file(path: &Path) -> Result<Vec<QueuedRun>, AnalyzerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| AnalyzerError::QueueFileIo(path.to_owned(), e))?;
    let mut rows = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 || fields.len() > 4 {
            return Err(AnalyzerError::MalformedQueueRow {
                path: path.to_owned(),
                line: line_no + 1,
                reason: format!("expected 3 or 4 comma-separated fields, got {}", fields.len()),
            });
        }
        let timeout_secs: u64 = fields[2].parse().map_err(|_| AnalyzerError::MalformedQueueRow {
            path: path.to_owned(),
            line: line_no + 1,
            reason: format!("timeout `{}` is not a non-negative integer", fields[2]),
        })?;
        let commit = if fields[1].is_empty() { None } else { Some(fields[1].to_owned()) };
        let config = fields.get(3).filter(|s| !s.is_empty()).map(|s| PathBuf::from(*s));
        rows.push(QueuedRun {
            name: fields[0].to_owned(),
            commit,
            timeout: Duration::from_secs(timeout_secs),
            config,
        });
    }
    Ok(rows)
}

fn run_git(args: &[&str]) -> Result<(), AnalyzerError> {
    let status = Command::new("git")
        .args(args)
        .status()
        .map_err(|source| AnalyzerError::GitCommand {
            args: args.iter().map(|s| s.to_string()).collect(),
            source,
        })?;
    if !status.success() {
        return Err(AnalyzerError::GitCommandFailed {
            args: args.iter().map(|s| s.to_string()).collect(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

fn current_branch() -> Result<String, AnalyzerError> {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .output()
        .map_err(|source| AnalyzerError::GitCommand {
            args: vec!["branch".into(), "--show-current".into()],
            source,
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

/// Executes one queued run of the fuzzer binary, returning the run UUID it
/// printed on completion.
#[instrument(skip(fuzzer_binary, active_config_path))]
fn execute_one(
    run: &QueuedRun,
    fuzzer_binary: &Path,
    active_config_path: &Path,
) -> Result<String, AnalyzerError> {
    if let Some(commit) = &run.commit {
        run_git(&["checkout", commit])?;
    }

    if let Some(config) = &run.config {
        std::fs::copy(config, active_config_path).map_err(|_| AnalyzerError::UnknownBenchConfig(config.clone()))?;
    }

    let mut child = Command::new(fuzzer_binary)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| AnalyzerError::FuzzerSpawn(fuzzer_binary.to_owned(), e))?;

    let deadline = std::time::Instant::now() + run.timeout;
    let exited = loop {
        if let Ok(Some(_)) = child.try_wait() {
            break true;
        }
        if std::time::Instant::now() >= deadline {
            break false;
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    if !exited {
        // Graceful interrupt first (the fuzzer's own cancellation path
        // flushes best-effort and still prints its run UUID), escalate only
        // if it won't go.
        let _ = Command::new("kill").args(["-s", "INT", &child.id().to_string()]).status();
        let grace = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < grace {
            if let Ok(Some(_)) = child.try_wait() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        let _ = child.kill();
    }

    let mut stdout = String::new();
    if let Some(mut handle) = child.stdout.take() {
        let _ = handle.read_to_string(&mut stdout);
    }
    let _ = child.wait();

    stdout
        .lines()
        .rev()
        .find(|line| uuid::Uuid::parse_str(line.trim()).is_ok())
        .map(|line| line.trim().to_owned())
        .ok_or(AnalyzerError::MissingRunUuid)
}

/// Runs every queued row in order, restoring the original git branch and
/// config file when done (even if a run fails partway through).
pub fn execute_runs(
    queued_runs: &[QueuedRun],
    fuzzer_binary: &Path,
    active_config_path: &Path,
) -> Result<IndexMap<String, String>, AnalyzerError> {
    let original_branch = current_branch().ok();
    let config_backup = tempfile::NamedTempFile::new().ok();
    if let (Some(backup), true) = (&config_backup, active_config_path.is_file()) {
        let _ = std::fs::copy(active_config_path, backup.path());
    }

    let mut uuids_to_names = IndexMap::new();
    let run_result = (|| -> Result<(), AnalyzerError> {
        for run in queued_runs {
            let uuid = execute_one(run, fuzzer_binary, active_config_path)?;
            info!(run_name = %run.name, run_uuid = %uuid, "queued run finished");
            uuids_to_names.insert(uuid, run.name.clone());
        }
        Ok(())
    })();

    if let Some(branch) = original_branch.filter(|b| !b.is_empty())
        && let Err(e) = run_git(&["switch", &branch])
    {
        warn!(error = %e, "failed to restore original git branch");
    }
    if let Some(backup) = config_backup {
        let _ = std::fs::copy(backup.path(), active_config_path);
    }

    run_result?;
    Ok(uuids_to_names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_field_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.csv");
        std::fs::write(&path, "baseline,main,30\nvariant,feature-x,45\n").unwrap();
        let rows = parse_queue_file(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "baseline");
        assert_eq!(rows[0].timeout, Duration::from_secs(30));
        assert_eq!(rows[1].commit.as_deref(), Some("feature-x"));
    }

    #[test]
    fn parses_optional_fourth_config_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.csv");
        std::fs::write(&path, "with-config,main,10,aggressive.toml\n").unwrap();
        let rows = parse_queue_file(&path).unwrap();
        assert_eq!(rows[0].config, Some(PathBuf::from("aggressive.toml")));
    }

    #[test]
    fn rejects_rows_with_too_few_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.csv");
        std::fs::write(&path, "only,two\n").unwrap();
        let err = parse_queue_file(&path).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedQueueRow { .. }));
    }

    #[test]
    fn rejects_non_integer_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.csv");
        std::fs::write(&path, "bad,main,soon\n").unwrap();
        let err = parse_queue_file(&path).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedQueueRow { .. }));
    }
}
