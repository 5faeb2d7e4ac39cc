//! Layered configuration. The recognized surface is read from a
//! single TOML file; a handful of CLI flags (log level, worker count, RNG
//! seed) layer on top of it the way `GlobalOptions` layers flags over
//! subcommand options elsewhere in this tool family.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{ParseTreeFieldConfig, TargetConfig};

fn default_timeout_ms() -> u64 {
    100_000
}

fn default_rough_desired_queue_len() -> usize {
    100
}

fn default_deletion_lengths() -> Vec<usize> {
    vec![4, 3, 2, 1]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub seed_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_execution_dir")]
    pub execution_dir: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub detect_output_differentials: bool,
    #[serde(default)]
    pub use_grammar_mutations: bool,
    #[serde(default)]
    pub differentiate_nonzero_exit_statuses: bool,
    #[serde(default = "default_rough_desired_queue_len")]
    pub rough_desired_queue_len: usize,
    #[serde(default = "default_deletion_lengths")]
    pub deletion_lengths: Vec<usize>,
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub parse_tree_fields: Vec<ParseTreeFieldConfig>,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_execution_dir() -> PathBuf {
    PathBuf::from("execution")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_owned(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.seed_dir.is_dir() {
            return Err(ConfigError::SeedDirMissing(self.seed_dir.clone()));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if self.deletion_lengths.is_empty() {
            return Err(ConfigError::EmptyDeletionLengths);
        }
        if !self.results_dir.is_dir() {
            return Err(ConfigError::ResultsDirMissing(self.results_dir.clone()));
        }
        if !self.reports_dir.is_dir() {
            return Err(ConfigError::ReportsDirMissing(self.reports_dir.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_missing_seed_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("diffuzz.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            seed_dir = "{}"
            [[targets]]
            name = "a"
            executable = "/bin/true"
            "#,
            dir.path().join("does-not-exist").display()
        )
        .unwrap();
        let err = Config::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::SeedDirMissing(_)));
    }

    #[test]
    fn rejects_empty_targets() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds");
        std::fs::create_dir(&seeds).unwrap();
        let config_path = dir.path().join("diffuzz.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, r#"seed_dir = "{}"
targets = []"#, seeds.display()).unwrap();
        let err = Config::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargets));
    }

    #[test]
    fn loads_a_minimal_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds");
        std::fs::create_dir(&seeds).unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir(&results).unwrap();
        let reports = dir.path().join("reports");
        std::fs::create_dir(&reports).unwrap();
        let config_path = dir.path().join("diffuzz.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            seed_dir = "{}"
            results_dir = "{}"
            reports_dir = "{}"

            [[targets]]
            name = "a"
            executable = "/bin/true"
            "#,
            seeds.display(),
            results.display(),
            reports.display(),
        )
        .unwrap();
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.deletion_lengths, vec![4, 3, 2, 1]);
        assert_eq!(config.targets.len(), 1);
    }

    #[test]
    fn rejects_missing_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds");
        std::fs::create_dir(&seeds).unwrap();
        let reports = dir.path().join("reports");
        std::fs::create_dir(&reports).unwrap();
        let config_path = dir.path().join("diffuzz.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            seed_dir = "{}"
            results_dir = "{}"
            reports_dir = "{}"

            [[targets]]
            name = "a"
            executable = "/bin/true"
            "#,
            seeds.display(),
            dir.path().join("does-not-exist-results").display(),
            reports.display(),
        )
        .unwrap();
        let err = Config::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ResultsDirMissing(_)));
    }

    #[test]
    fn rejects_missing_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds");
        std::fs::create_dir(&seeds).unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir(&results).unwrap();
        let config_path = dir.path().join("diffuzz.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            seed_dir = "{}"
            results_dir = "{}"
            reports_dir = "{}"

            [[targets]]
            name = "a"
            executable = "/bin/true"
            "#,
            seeds.display(),
            results.display(),
            dir.path().join("does-not-exist-reports").display(),
        )
        .unwrap();
        let err = Config::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ReportsDirMissing(_)));
    }
}
