//! Module A: the external tracer adapter.
//!
//! Delegates coverage collection to an external, AFL-`showmap`-shaped tool:
//! we never instrument the targets ourselves. Invoked once per target in
//! batch mode (one directory of input files in, one directory of
//! `edge:hit_count` files out).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{instrument, warn};

use crate::error::TracerError;
use crate::model::{EdgeSet, TargetConfig};

/// Name of the external edge tracer binary. A real deployment points this
/// at `afl-showmap` or an AFL++ equivalent; tests substitute a stub.
const NATIVE_TRACER: &str = "afl-showmap";
const INTERPRETER_TRACER: &str = "py-afl-showmap";

fn tracer_command_line(target: &TargetConfig, input_dir: &Path, output_dir: &Path, timeout_ms: u64) -> Command {
    let mut cmd = if target.needs_interpreter_tracer {
        Command::new(INTERPRETER_TRACER)
    } else {
        let mut cmd = Command::new(NATIVE_TRACER);
        if target.needs_qemu {
            cmd.arg("-Q");
        }
        cmd
    };
    cmd.arg("-i")
        .arg(input_dir)
        .arg("-o")
        .arg(output_dir)
        .arg("-e")
        .arg("-t")
        .arg(timeout_ms.to_string())
        .arg("--")
        .arg(&target.executable)
        .args(&target.cli_args)
        .envs(&target.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn parse_tracer_output(raw: &[u8]) -> EdgeSet {
    let mut edges = BTreeSet::new();
    for line in raw.split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if let Some((edge, _hits)) = line.split_once(':')
            && let Ok(edge) = edge.parse::<u32>()
        {
            edges.insert(edge);
        }
    }
    EdgeSet::from_edges(edges)
}

/// Traces a batch of inputs against every tracing-enabled target, returning
/// one [`EdgeSet`] per (input, target) pair indexed `[input_index][target_index]`.
///
/// Targets with `needs_tracing = false` contribute an empty set for every
/// input without invoking anything.
#[instrument(skip(scratch_dir, inputs, targets), fields(input_count = inputs.len()))]
pub fn trace_batch(
    scratch_dir: &Path,
    inputs: &[Vec<u8>],
    targets: &[TargetConfig],
    timeout_ms: u64,
) -> Result<Vec<Vec<EdgeSet>>, TracerError> {
    let gen_dir = scratch_dir.join("generation");
    std::fs::create_dir_all(&gen_dir).map_err(|e| TracerError::ScratchDirIo(gen_dir.clone(), e))?;
    for (i, input) in inputs.iter().enumerate() {
        let path = gen_dir.join(i.to_string());
        std::fs::write(&path, input).map_err(|e| TracerError::InputWriteIo(path, e))?;
    }

    let trace_dir = scratch_dir.join("trace");
    std::fs::create_dir_all(&trace_dir).map_err(|e| TracerError::ScratchDirIo(trace_dir.clone(), e))?;

    let mut target_output_dirs = Vec::with_capacity(targets.len());
    for (t, target) in targets.iter().enumerate() {
        let output_dir = trace_dir.join(t.to_string());
        std::fs::create_dir_all(&output_dir).map_err(|e| TracerError::ScratchDirIo(output_dir.clone(), e))?;
        if target.needs_tracing {
            let mut cmd = tracer_command_line(target, &gen_dir, &output_dir, timeout_ms);
            let mut child = cmd.spawn().map_err(|source| TracerError::Spawn {
                target: target.name.clone(),
                source,
            })?;
            let status = child.wait().map_err(|source| TracerError::Wait {
                target: target.name.clone(),
                source,
            })?;
            if !status.success() {
                warn!(target = %target.name, ?status, "tracer exited non-zero for this target; treating missing files as empty coverage");
            }
        }
        target_output_dirs.push(output_dir);
    }

    let mut per_input_fingerprints = vec![Vec::with_capacity(targets.len()); inputs.len()];
    for (t, target) in targets.iter().enumerate() {
        for i in 0..inputs.len() {
            let edge_set = if target.needs_tracing {
                let output_file = target_output_dirs[t].join(i.to_string());
                match std::fs::read(&output_file) {
                    Ok(raw) => parse_tracer_output(&raw),
                    Err(_) => EdgeSet::empty(),
                }
            } else {
                EdgeSet::empty()
            };
            per_input_fingerprints[i].push(edge_set);
        }
    }

    let _ = std::fs::remove_dir_all(scratch_dir);

    Ok(per_input_fingerprints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tracer_output_dedupes_and_ignores_hit_counts() {
        let raw = b"12:3\n12:9\n7:1\nmalformed\n\n";
        let set = parse_tracer_output(raw);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&12));
        assert!(set.contains(&7));
    }

    #[test]
    fn parse_tracer_output_on_empty_bytes_is_empty_set() {
        assert!(parse_tracer_output(b"").is_empty());
    }

    #[test]
    fn untraced_target_never_spawns_and_yields_empty_sets() {
        let dir = tempfile::tempdir().unwrap();
        let target = TargetConfig::new("oracle".into(), "/bin/true".into());
        let inputs = vec![b"a".to_vec(), b"b".to_vec()];
        let result = trace_batch(dir.path(), &inputs, std::slice::from_ref(&target), 1000).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0][0].is_empty());
        assert!(result[1][0].is_empty());
    }
}
