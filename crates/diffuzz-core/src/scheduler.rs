//! The generational scheduler — the supervisor that ties
//! every other module together into the fuzzing loop proper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::differential;
use crate::fingerprint::NoveltyFilter;
use crate::minimize;
use crate::model::{EdgeSet, Fingerprint, ParseTree, Status, TargetConfig};
use crate::mutation;
use crate::report::{DifferentialRecord, Report, RunDir};
use crate::runner;
use crate::tracer;

/// One input's full evaluation: its fingerprint (coverage), its statuses and
/// parse trees across every target.
struct Evaluation {
    input: Vec<u8>,
    fingerprint: Fingerprint,
    statuses: Vec<Status>,
    parse_trees: Vec<Option<ParseTree>>,
}

fn evaluate_batch(
    scratch_dir: &std::path::Path,
    batch: &[Vec<u8>],
    targets: &[TargetConfig],
    config: &Config,
) -> Vec<Evaluation> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let field_names: Vec<String> = config.parse_tree_fields.iter().map(|f| f.name.clone()).collect();

    let edge_sets = tracer::trace_batch(scratch_dir, batch, targets, config.timeout_ms).unwrap_or_else(|e| {
        warn!(error = %e, "tracer adapter failed for this batch; treating every input as zero coverage");
        vec![vec![EdgeSet::empty(); targets.len()]; batch.len()]
    });

    batch
        .iter()
        .zip(edge_sets)
        .map(|(input, edges)| {
            let executions = runner::run_untraced(
                targets,
                input,
                timeout,
                config.detect_output_differentials,
                config.differentiate_nonzero_exit_statuses,
                &field_names,
            )
            .unwrap_or_default();
            let statuses = executions.iter().map(|e| e.status).collect();
            let parse_trees = executions.into_iter().map(|e| e.parse_tree).collect();
            Evaluation {
                input: input.clone(),
                fingerprint: Fingerprint::new(edges),
                statuses,
                parse_trees,
            }
        })
        .collect()
}

fn partition_into_batches(queue: Vec<Vec<u8>>, num_batches: usize) -> Vec<Vec<Vec<u8>>> {
    let num_batches = num_batches.max(1);
    let batch_size = queue.len().div_ceil(num_batches).max(1);
    queue
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Runs the fuzzing loop to completion (queue drains) or until `interrupted`
/// is set. Returns the final report, already fully written to disk.
pub fn run(
    config: &Config,
    interrupted: Arc<AtomicBool>,
    rng_seed: Option<u64>,
) -> anyhow::Result<Report> {
    let run_uuid = Uuid::new_v4();
    let run_dir = RunDir::create(&config.results_dir, &config.reports_dir, run_uuid)?;
    let mut report = Report::new(run_uuid);

    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut input_queue: Vec<Vec<u8>> = std::fs::read_dir(&config.seed_dir)?
        .filter_map(Result::ok)
        .map(|entry| std::fs::read(entry.path()))
        .collect::<Result<_, _>>()?;

    let mut novelty = NoveltyFilter::new();
    let mut minimized_fingerprints: std::collections::HashSet<Fingerprint> = std::collections::HashSet::new();
    let mut cumulative_edges: HashMap<String, EdgeSet> =
        config.targets.iter().map(|t| (t.name.clone(), EdgeSet::empty())).collect();

    let start = Instant::now();
    let mut generation: u64 = 0;
    let grammar = if config.use_grammar_mutations {
        Some(diffuzz_grammar::default_uri::uri_grammar()?)
    } else {
        None
    };

    while !input_queue.is_empty() && !interrupted.load(Ordering::SeqCst) {
        let span = info_span!("generation", generation, queue_len = input_queue.len());
        let _enter = span.enter();

        let num_cpus = num_cpus::get();
        let batches = partition_into_batches(std::mem::take(&mut input_queue), num_cpus);

        let evaluations: Vec<Evaluation> = batches
            .into_par_iter()
            .enumerate()
            .flat_map(|(batch_index, batch)| {
                let scratch_dir = config.execution_dir.join(format!("gen{generation}-batch{batch_index}"));
                evaluate_batch(&scratch_dir, &batch, &config.targets, config)
            })
            .collect();

        let mut mutation_candidates = Vec::new();
        let mut differentials = Vec::new();
        for evaluation in evaluations {
            for (target, edges) in config.targets.iter().zip(evaluation.fingerprint.0.iter()) {
                if let Some(acc) = cumulative_edges.get_mut(&target.name) {
                    *acc = acc.union(edges);
                }
            }
            if novelty.observe(evaluation.fingerprint) {
                if differential::is_differential(
                    &evaluation.statuses,
                    &evaluation.parse_trees,
                    config.detect_output_differentials,
                    &config.parse_tree_fields,
                ) {
                    differentials.push(evaluation.input);
                } else {
                    mutation_candidates.push(evaluation.input);
                }
            }
        }

        let field_names: Vec<String> = config.parse_tree_fields.iter().map(|f| f.name.clone()).collect();
        let timeout = Duration::from_millis(config.timeout_ms);
        let minimized_inputs: Vec<Vec<u8>> = differentials
            .par_iter()
            .map(|bug| {
                let evaluate = |candidate: &[u8]| -> (Vec<Status>, Vec<Option<ParseTree>>) {
                    let executions = runner::run_untraced(
                        &config.targets,
                        candidate,
                        timeout,
                        config.detect_output_differentials,
                        config.differentiate_nonzero_exit_statuses,
                        &field_names,
                    )
                    .unwrap_or_default();
                    let statuses = executions.iter().map(|e| e.status).collect();
                    let trees = executions.into_iter().map(|e| e.parse_tree).collect();
                    (statuses, trees)
                };
                minimize::minimize(bug, &config.deletion_lengths, &config.parse_tree_fields, &evaluate)
            })
            .collect();

        if !minimized_inputs.is_empty() {
            let scratch_dir = config.execution_dir.join(format!("gen{generation}-minimized"));
            let edge_sets =
                tracer::trace_batch(&scratch_dir, &minimized_inputs, &config.targets, config.timeout_ms).unwrap_or_else(|e| {
                    warn!(error = %e, "tracer adapter failed while re-fingerprinting minimized differentials; treating them as zero coverage");
                    vec![vec![EdgeSet::empty(); config.targets.len()]; minimized_inputs.len()]
                });
            for (bytes, edges) in minimized_inputs.iter().zip(edge_sets) {
                let fp = Fingerprint::new(edges);
                if minimized_fingerprints.insert(fp) {
                    let index = report.differentials.len();
                    let path = run_dir.write_differential(index, bytes)?;
                    report.differentials.push(DifferentialRecord {
                        bytes_base64: BASE64.encode(bytes),
                        path,
                        time: start.elapsed().as_secs_f64(),
                        generation,
                    });
                }
            }
        }

        for (name, edges) in &cumulative_edges {
            let sample = crate::model::CoverageSample {
                edges: edges.len(),
                time: start.elapsed().as_secs_f64(),
                generation,
            };
            report.coverage.entry(name.clone()).or_default().push(sample);
        }
        run_dir.write_report(&report)?;

        info!(
            differentials = report.differentials.len(),
            mutation_candidates = mutation_candidates.len(),
            "end of generation"
        );

        input_queue.clear();
        while !mutation_candidates.is_empty() && input_queue.len() < config.rough_desired_queue_len {
            for candidate in &mutation_candidates {
                input_queue.push(mutation::mutate(candidate, grammar.as_ref(), &mut rng));
                if input_queue.len() >= config.rough_desired_queue_len {
                    break;
                }
            }
        }

        generation += 1;
    }

    println!("{run_uuid}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_evenly_across_batches() {
        let queue: Vec<Vec<u8>> = (0..10).map(|i| vec![i]).collect();
        let batches = partition_into_batches(queue, 4);
        assert_eq!(batches.len(), 4);
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 10);
    }

    #[test]
    fn partitions_a_single_item_into_one_batch() {
        let queue = vec![vec![1u8]];
        let batches = partition_into_batches(queue, 8);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn empty_queue_partitions_to_no_batches() {
        let batches = partition_into_batches(Vec::new(), 4);
        assert!(batches.is_empty());
    }
}
