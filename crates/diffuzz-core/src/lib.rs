//! Coverage-guided differential fuzzing: run the same input past several
//! parser targets, flag exit-status or parse-tree disagreement, and shrink
//! the disagreement to a minimal witness.
//!
//! [`scheduler::run`] is the entry point a CLI wires up; every other module
//! is a load-bearing piece of that loop and is independently testable.

pub mod analyzer;
pub mod config;
pub mod differential;
pub mod error;
pub mod fingerprint;
pub mod minimize;
pub mod model;
pub mod mutation;
pub mod normalize;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod tracer;

pub use config::Config;
pub use model::{EdgeSet, Fingerprint, ParseTree, Status, TargetConfig};
pub use report::Report;
