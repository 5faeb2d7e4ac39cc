//! The differential detector: decides whether one input's per-target
//! executions disagree enough to count as a bug.

use std::collections::HashSet;

use crate::model::{ParseTree, ParseTreeFieldConfig, Status, compare_parse_trees};

/// Decides whether one input's observed statuses/parse-trees constitute a
/// differential:
/// - more than one distinct (canonicalized) status among the targets, or
/// - (when output-differential mode is on and every status is zero) the
///   targets' parse trees aren't all pairwise equal.
pub fn is_differential(
    statuses: &[Status],
    parse_trees: &[Option<ParseTree>],
    detect_output_differentials: bool,
    parse_tree_fields: &[ParseTreeFieldConfig],
) -> bool {
    let distinct_statuses: HashSet<_> = statuses.iter().collect();
    if distinct_statuses.len() > 1 {
        return true;
    }
    let all_zero = statuses.iter().all(|s| *s == Status::Code(0));
    if detect_output_differentials && all_zero {
        return !all_parse_trees_equal(parse_trees, parse_tree_fields);
    }
    false
}

fn all_parse_trees_equal(parse_trees: &[Option<ParseTree>], fields: &[ParseTreeFieldConfig]) -> bool {
    parse_trees
        .windows(2)
        .all(|pair| compare_parse_trees(pair[0].as_ref(), pair[1].as_ref(), fields).iter().all(|b| *b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn tree(path: &str) -> ParseTree {
        let mut fields = IndexMap::new();
        fields.insert("path".to_owned(), path.as_bytes().to_vec());
        ParseTree { fields }
    }

    fn path_field() -> Vec<ParseTreeFieldConfig> {
        vec![ParseTreeFieldConfig {
            name: "path".into(),
            compare: crate::model::FieldCompareMode::Exact,
        }]
    }

    #[test]
    fn status_disagreement_is_a_differential_regardless_of_output_mode() {
        let statuses = vec![Status::Code(0), Status::Code(1)];
        let trees = vec![None, None];
        assert!(is_differential(&statuses, &trees, false, &[]));
    }

    #[test]
    fn matching_statuses_and_outputs_is_not_a_differential() {
        let statuses = vec![Status::Code(0), Status::Code(0)];
        let trees = vec![Some(tree("/a")), Some(tree("/a"))];
        assert!(!is_differential(&statuses, &trees, true, &path_field()));
    }

    #[test]
    fn output_disagreement_only_counts_when_output_mode_is_on() {
        let statuses = vec![Status::Code(0), Status::Code(0)];
        let trees = vec![Some(tree("/a")), Some(tree("/b"))];
        assert!(!is_differential(&statuses, &trees, false, &path_field()));
        assert!(is_differential(&statuses, &trees, true, &path_field()));
    }

    #[test]
    fn single_target_can_never_differ() {
        let statuses = vec![Status::Code(0)];
        let trees = vec![Some(tree("/a"))];
        assert!(!is_differential(&statuses, &trees, true, &path_field()));
    }
}
