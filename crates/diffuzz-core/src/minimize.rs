//! The delta-debugging, signature-preserving minimizer.

use itertools::Itertools;

use crate::model::{ParseTree, ParseTreeFieldConfig, Status, compare_parse_trees};

/// The signature a reduction must preserve: the canonicalized status vector,
/// plus — only when every status is zero — the pairwise parse-tree
/// comparison tuples over every target pair. When any status is nonzero,
/// parse-tree comparison is suppressed entirely: a status disagreement is
/// already enough to call two runs different, and asking for matching
/// output on top of it would reject reductions that are still valid bugs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
    statuses: Vec<Status>,
    parse_tree_comparisons: Vec<Vec<bool>>,
}

fn signature_of(
    statuses: &[Status],
    parse_trees: &[Option<ParseTree>],
    fields: &[ParseTreeFieldConfig],
) -> Signature {
    let all_zero = statuses.iter().all(|s| *s == Status::Code(0));
    let parse_tree_comparisons = if all_zero {
        (0..parse_trees.len())
            .tuple_combinations::<(usize, usize)>()
            .map(|(i, j)| compare_parse_trees(parse_trees[i].as_ref(), parse_trees[j].as_ref(), fields))
            .collect()
    } else {
        vec![vec![true]]
    };
    Signature {
        statuses: statuses.to_vec(),
        parse_tree_comparisons,
    }
}

/// A single evaluation of a candidate input, produced by whatever untraced
/// runner the caller is using (kept generic here so this module doesn't
/// depend on process spawning).
pub type Evaluate<'a> = dyn Fn(&[u8]) -> (Vec<Status>, Vec<Option<ParseTree>>) + 'a;

/// Shrinks `input` to a locally minimal witness of the same disagreement
/// signature, trying deletion lengths from `deletion_lengths` in order
/// (longest first handles multi-byte boundaries before single-byte trims).
pub fn minimize(input: &[u8], deletion_lengths: &[usize], fields: &[ParseTreeFieldConfig], evaluate: &Evaluate) -> Vec<u8> {
    let (orig_statuses, orig_trees) = evaluate(input);
    let target_signature = signature_of(&orig_statuses, &orig_trees, fields);

    let mut result = input.to_vec();
    for &deletion_length in deletion_lengths {
        if deletion_length == 0 {
            continue;
        }
        let mut i = result.len() as isize - deletion_length as isize;
        while i >= 0 {
            let i_usize = i as usize;
            let mut candidate = Vec::with_capacity(result.len() - deletion_length);
            candidate.extend_from_slice(&result[..i_usize]);
            candidate.extend_from_slice(&result[i_usize + deletion_length..]);

            let (statuses, trees) = evaluate(&candidate);
            let candidate_signature = signature_of(&statuses, &trees, fields);

            if candidate_signature == target_signature {
                result = candidate;
                i -= deletion_length as isize;
            } else {
                i -= 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_same_signature(_: &[u8]) -> (Vec<Status>, Vec<Option<ParseTree>>) {
        (vec![Status::Code(0), Status::Code(1)], vec![None, None])
    }

    #[test]
    fn minimizes_toward_empty_when_signature_never_changes() {
        let input = b"abcdefgh";
        let result = minimize(input, &[4, 3, 2, 1], &[], &always_same_signature);
        assert!(result.is_empty());
    }

    fn signature_breaks_below_three_bytes(bytes: &[u8]) -> (Vec<Status>, Vec<Option<ParseTree>>) {
        if bytes.len() >= 3 {
            (vec![Status::Code(0), Status::Code(1)], vec![None, None])
        } else {
            (vec![Status::Code(0), Status::Code(0)], vec![None, None])
        }
    }

    #[test]
    fn stops_shrinking_once_signature_would_change() {
        let input = b"abcdefgh";
        let result = minimize(input, &[4, 3, 2, 1], &[], &signature_breaks_below_three_bytes);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn local_minimality_any_further_deletion_changes_signature() {
        let input = b"abcdefgh";
        let result = minimize(input, &[4, 3, 2, 1], &[], &signature_breaks_below_three_bytes);
        for length in [4, 3, 2, 1] {
            if length > result.len() {
                continue;
            }
            let mut i = 0;
            while i + length <= result.len() {
                let mut candidate = result[..i].to_vec();
                candidate.extend_from_slice(&result[i + length..]);
                let before = signature_of(&signature_breaks_below_three_bytes(&result).0, &signature_breaks_below_three_bytes(&result).1, &[]);
                let after_eval = signature_breaks_below_three_bytes(&candidate);
                let after = signature_of(&after_eval.0, &after_eval.1, &[]);
                assert_ne!(before, after, "deleting [{i}, {}) should have changed the signature", i + length);
                i += 1;
            }
        }
    }
}
