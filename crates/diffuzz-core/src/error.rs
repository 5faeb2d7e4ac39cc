//! Typed failure modes at each module boundary. Call sites that merely
//! propagate a failure (rather than branch on its kind) use `anyhow::Context`
//! instead of matching these variants by hand.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path} as TOML: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("seed directory {0} does not exist or is not a directory")]
    SeedDirMissing(PathBuf),
    #[error("no targets configured; a differential fuzzer needs at least one")]
    NoTargets,
    #[error("results directory {0} does not exist or is not a directory")]
    ResultsDirMissing(PathBuf),
    #[error("reports directory {0} does not exist or is not a directory")]
    ReportsDirMissing(PathBuf),
    #[error("deletion_lengths must be non-empty")]
    EmptyDeletionLengths,
}

#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    #[error("creating scratch directory {0}")]
    ScratchDirIo(PathBuf, #[source] std::io::Error),
    #[error("writing generated input file {0}")]
    InputWriteIo(PathBuf, #[source] std::io::Error),
    #[error("spawning tracer for target {target}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("waiting on tracer for target {target}")]
    Wait {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("spawning target {target}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("writing stdin for target {target}")]
    StdinWrite {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("creating run directory {0}")]
    RunDirIo(PathBuf, #[source] std::io::Error),
    #[error("writing differential file {0}")]
    DifferentialWriteIo(PathBuf, #[source] std::io::Error),
    #[error("serializing report to JSON")]
    Serialize(#[source] serde_json::Error),
    #[error("writing report file {0}")]
    ReportWriteIo(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("queue file {path} line {line}: {reason}")]
    MalformedQueueRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("reading queue file {0}")]
    QueueFileIo(PathBuf, #[source] std::io::Error),
    #[error("run {0} has no report file")]
    MissingReport(String),
    #[error("run {0} has no results directory")]
    MissingResultsDir(String),
    #[error("report {0} is not valid JSON matching the expected schema")]
    ReportUnparseable(String, #[source] serde_json::Error),
    #[error("named config file {0} does not exist in the configs directory")]
    UnknownBenchConfig(PathBuf),
    #[error("running git command {args:?}")]
    GitCommand {
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("git command {args:?} exited with status {status}")]
    GitCommandFailed { args: Vec<String>, status: i32 },
    #[error("invoking fuzzer binary {0}")]
    FuzzerSpawn(PathBuf, #[source] std::io::Error),
    #[error("fuzzer binary did not print a run UUID on stdout")]
    MissingRunUuid,
    #[error("drawing plot to {0}")]
    Plotting(PathBuf, #[source] Box<dyn std::error::Error + Send + Sync>),
}
