mod analyze;
mod fuzz;
mod interpret;

use std::cmp::max;

use anyhow::Context;
use fuzz::FuzzCommand;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use analyze::AnalyzeCommand;
use interpret::InterpretCommand;

#[derive(Debug, clap::Parser)]
#[command(version, about, styles = clap::builder::Styles::styled())]
pub struct Cli {
    #[clap(flatten)]
    global_options: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub(super) fn run(self) -> anyhow::Result<()> {
        self.global_options.setup_rayon().context("setting up rayon")?;
        setup_logger(&self.global_options).context("setting up logger")?;
        match self.command {
            Command::Fuzz(cmd) => cmd.run(&self.global_options),
            Command::Analyze(cmd) => cmd.run(&self.global_options),
            Command::Interpret(cmd) => cmd.run(&self.global_options),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub(super) struct GlobalOptions {
    #[clap(long, default_value = "info")]
    default_log_level: LevelFilter,

    /// Seeds the mutation RNG; omit for a fresh seed from the OS on every run.
    #[clap(long)]
    pub(super) random_seed: Option<u64>,

    #[clap(long)]
    parallel_workers: Option<usize>,
}

impl GlobalOptions {
    pub fn setup_rayon(&self) -> Result<(), rayon::ThreadPoolBuildError> {
        rayon::ThreadPoolBuilder::new().num_threads(self.parallel_workers()).build_global()
    }

    pub fn parallel_workers(&self) -> usize {
        self.parallel_workers.unwrap_or_else(|| max(1, num_cpus::get() / 2))
    }
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Runs the generational fuzzing loop until the seed-derived queue drains
    /// or the process receives SIGINT.
    Fuzz(FuzzCommand),
    /// Re-traces persisted differentials and reports on coverage, bug
    /// counts, and cross-run overlap.
    Analyze(AnalyzeCommand),
    /// Replays a single input file past every target outside the fuzzing
    /// loop, printing each target's status and parse tree.
    Interpret(InterpretCommand),
}

fn setup_logger(global_opts: &GlobalOptions) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_owned())))
        .with(
            EnvFilter::builder()
                .with_default_directive(global_opts.default_log_level.into())
                .from_env()
                .context("constructing log filter from env")?,
        )
        .init();
    Ok(())
}
