use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use diffuzz_core::Config;
use tracing::info;

use super::GlobalOptions;

/// Fuzz a set of parser targets for differentials.
#[derive(Debug, clap::Parser)]
pub(super) struct FuzzCommand {
    /// Path to the TOML configuration file describing targets, seeds and
    /// mutation settings.
    #[clap(long, default_value = "diffuzz.toml")]
    config: PathBuf,
}

impl FuzzCommand {
    pub(super) fn run(self, global_options: &GlobalOptions) -> anyhow::Result<()> {
        let config = Config::load(&self.config).context("loading config")?;

        let interrupted = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            info!("received interrupt, finishing the in-flight generation and exiting");
            handler_flag.store(true, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;

        let report = diffuzz_core::scheduler::run(&config, interrupted, global_options.random_seed)
            .context("running the fuzzing loop")?;
        info!(
            differentials = report.differentials.len(),
            "fuzzing run finished"
        );
        Ok(())
    }
}
