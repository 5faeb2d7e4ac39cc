//! Module B: the untraced target runner.
//!
//! Spawns one subprocess per target per input, feeds the input on stdin,
//! and collects an exit status plus (if output-differential mode is on) a
//! parsed [`ParseTree`]. Every spawn is bounded by a wall-clock timeout so a
//! hung target can never stall a generation.

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::error::RunnerError;
use crate::model::{ParseTree, Status, TargetConfig};
use crate::normalize::normalize_field;

/// The result of running one target on one input.
#[derive(Debug, Clone)]
pub struct TargetExecution {
    pub status: Status,
    pub parse_tree: Option<ParseTree>,
}

fn spawn_untraced(target: &TargetConfig, capture_stdout: bool) -> Result<Child, RunnerError> {
    Command::new(&target.executable)
        .args(&target.cli_args)
        .envs(&target.env)
        .stdin(Stdio::piped())
        .stdout(if capture_stdout { Stdio::piped() } else { Stdio::null() })
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            target: target.name.clone(),
            source,
        })
}

/// Kills and reaps every already-spawned child. Used when a later target in
/// the same batch fails to spawn or take its input, so the earlier targets'
/// subprocesses don't outlive this call.
fn kill_all(children: &mut [Child]) {
    for child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn write_stdin(child: &mut Child, target: &TargetConfig, input: &[u8]) -> Result<(), RunnerError> {
    let mut stdin = child.stdin.take().expect("stdin was piped");
    match stdin.write_all(input) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            // The target exited before reading all of its input; that's a
            // legitimate outcome, not a runner failure.
        }
        Err(source) => {
            return Err(RunnerError::StdinWrite {
                target: target.name.clone(),
                source,
            });
        }
    }
    Ok(())
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn parse_stdout(
    raw: &[u8],
    target: &TargetConfig,
    parse_tree_field_names: &[String],
) -> Option<ParseTree> {
    let json: serde_json::Value = serde_json::from_slice(raw).ok()?;
    let object = json.as_object()?;
    let mut fields = indexmap::IndexMap::new();
    for name in parse_tree_field_names {
        if let Some(value) = object.get(name) {
            let encoded = value.as_str()?;
            let decoded = normalize_field(encoded).ok()?;
            fields.insert(name.clone(), decoded);
        }
    }
    let _ = &target.output_encoding;
    Some(ParseTree { fields })
}

/// Runs every configured target once on `input`, bounded by `timeout`.
/// `capture_stdout` should be the config's `detect_output_differentials`
/// flag; when false, stdout is discarded and every parse tree is `None`.
#[instrument(skip(targets, input, parse_tree_field_names), fields(input_len = input.len()))]
pub fn run_untraced(
    targets: &[TargetConfig],
    input: &[u8],
    timeout: Duration,
    capture_stdout: bool,
    differentiate_nonzero: bool,
    parse_tree_field_names: &[String],
) -> Result<Vec<TargetExecution>, RunnerError> {
    let mut children = Vec::with_capacity(targets.len());
    for target in targets {
        let mut child = match spawn_untraced(target, capture_stdout) {
            Ok(child) => child,
            Err(e) => {
                kill_all(&mut children);
                return Err(e);
            }
        };
        if let Err(e) = write_stdin(&mut child, target, input) {
            children.push(child);
            kill_all(&mut children);
            return Err(e);
        }
        children.push(child);
    }

    let mut executions = Vec::with_capacity(targets.len());
    for (target, mut child) in targets.iter().zip(children) {
        // Stdout is drained on its own thread rather than read to completion
        // up front: a target that hangs without closing stdout must still be
        // caught by `wait_with_timeout`'s kill, not block this loop forever
        // waiting on a pipe that never sees EOF.
        let stdout_reader = if capture_stdout {
            child.stdout.take().map(|mut s| {
                std::thread::spawn(move || {
                    use std::io::Read;
                    let mut buf = Vec::new();
                    let _ = s.read_to_end(&mut buf);
                    buf
                })
            })
        } else {
            None
        };

        let status = wait_with_timeout(child, timeout).map_err(|source| RunnerError::Spawn {
            target: target.name.clone(),
            source,
        })?;
        let stdout_bytes = stdout_reader.map(|handle| handle.join().unwrap_or_default());

        let status = match status {
            None => Status::TimedOut,
            Some(exit_status) => {
                let code = exit_status.code().unwrap_or(-1);
                Status::Code(code).canonicalize(differentiate_nonzero)
            }
        };

        let parse_tree = match (&status, &stdout_bytes) {
            (Status::Code(0), Some(raw)) => parse_stdout(raw, target, parse_tree_field_names),
            _ => None,
        };

        executions.push(TargetExecution { status, parse_tree });
    }

    Ok(executions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_nonzero_statuses_when_configured() {
        let raw = Status::Code(42);
        assert_eq!(raw.canonicalize(false), Status::Code(1));
        assert_eq!(raw.canonicalize(true), Status::Code(42));
    }

    #[test]
    fn zero_status_never_canonicalizes_away() {
        assert_eq!(Status::Code(0).canonicalize(false), Status::Code(0));
    }

    #[test]
    fn timeout_status_is_distinct_from_any_code() {
        assert_ne!(Status::TimedOut, Status::Code(1));
        assert_ne!(Status::TimedOut, Status::Code(0));
    }

    #[test]
    fn parse_stdout_requires_zero_status_elsewhere() {
        let target = TargetConfig::new("t".into(), "/bin/true".into());
        let fields = vec!["host".to_owned()];
        let bad_json = b"not json";
        assert!(parse_stdout(bad_json, &target, &fields).is_none());
    }

    #[test]
    fn a_later_spawn_failure_kills_earlier_targets_rather_than_leaking_them() {
        let targets = vec![
            TargetConfig::new("good".into(), "/bin/cat".into()),
            TargetConfig::new("bad".into(), "/does/not/exist".into()),
        ];
        let fields: Vec<String> = Vec::new();
        let err = run_untraced(&targets, b"abc", Duration::from_millis(500), false, false, &fields).unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
