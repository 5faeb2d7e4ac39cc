use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use diffuzz_core::Config;

use super::GlobalOptions;

/// Replays a single input file past every configured target, outside the
/// generational loop, for a human debugging one input by hand.
#[derive(Debug, clap::Parser)]
pub(super) struct InterpretCommand {
    /// The file to feed to every target's stdin.
    file: PathBuf,

    /// Path to the TOML configuration file describing targets and
    /// comparison settings.
    #[clap(long, default_value = "diffuzz.toml")]
    config: PathBuf,
}

impl InterpretCommand {
    pub(super) fn run(self, _global_options: &GlobalOptions) -> anyhow::Result<()> {
        let config = Config::load(&self.config).context("loading config")?;
        let input = std::fs::read(&self.file).with_context(|| format!("reading {}", self.file.display()))?;

        let field_names: Vec<String> = config.parse_tree_fields.iter().map(|f| f.name.clone()).collect();
        let executions = diffuzz_core::runner::run_untraced(
            &config.targets,
            &input,
            Duration::from_millis(config.timeout_ms),
            config.detect_output_differentials,
            config.differentiate_nonzero_exit_statuses,
            &field_names,
        )
        .context("running targets on the input")?;

        for (target, execution) in config.targets.iter().zip(executions) {
            println!("{}", target.executable.display());
            println!("{:?}", execution.status);
            match execution.parse_tree {
                Some(tree) => println!("{tree:?}"),
                None => println!("absent"),
            }
        }

        Ok(())
    }
}
