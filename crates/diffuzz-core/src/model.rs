//! Value types shared across the tracer, runner, detector and minimizer.
//!
//! [`ParseTree`] is deliberately schema-less at the type level: the set of
//! fields it holds, and how two values of a field compare, are config data
//! (see [`crate::config::ParseTreeFieldConfig`]), not hard-coded URL fields.

use std::collections::BTreeSet;

use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One configured fuzzing target. Immutable and process-wide for the
/// lifetime of a run.
#[derive(Debug, Clone, derive_new::new, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub executable: std::path::PathBuf,
    #[new(default)]
    pub cli_args: Vec<String>,
    #[new(default)]
    pub needs_tracing: bool,
    #[new(default)]
    pub needs_qemu: bool,
    #[new(default)]
    pub needs_interpreter_tracer: bool,
    #[new(default)]
    pub env: IndexMap<String, String>,
    #[new(value = "\"UTF-8\".to_owned()")]
    pub output_encoding: String,
}

/// A set of control-flow edge ids a single target exercised on a single
/// input. Value-hashable, so two equal sets hash equal regardless of
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deref, DerefMut)]
pub struct EdgeSet(BTreeSet<u32>);

impl EdgeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = u32>) -> Self {
        Self(edges.into_iter().collect())
    }

    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }
}

/// An ordered tuple of per-target [`EdgeSet`]s: one input's coverage
/// signature across every configured target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub Vec<EdgeSet>);

impl Fingerprint {
    pub fn new(edge_sets: Vec<EdgeSet>) -> Self {
        Self(edge_sets)
    }
}

/// A structured parse result from one target. Absent means the target
/// either exited nonzero or produced stdout that didn't parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTree {
    pub fields: IndexMap<String, Vec<u8>>,
}

impl ParseTree {
    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }
}

/// How two values of a single parse-tree field should be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCompareMode {
    /// Byte-for-byte equality.
    Exact,
    /// A field missing from one side compares equal to an empty field on
    /// the other (e.g. an absent path treated the same as `/`-normalized
    /// empty path).
    TreatAbsentAndEmptyAsEquivalent,
}

impl FieldCompareMode {
    fn compare(self, a: Option<&[u8]>, b: Option<&[u8]>) -> bool {
        match self {
            FieldCompareMode::Exact => a == b,
            FieldCompareMode::TreatAbsentAndEmptyAsEquivalent => {
                let normalize = |v: Option<&[u8]>| v.filter(|bytes| !bytes.is_empty());
                normalize(a) == normalize(b)
            }
        }
    }
}

/// The declared, ordered set of parse-tree fields this run compares, and how
/// each one is compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseTreeFieldConfig {
    pub name: String,
    pub compare: FieldCompareMode,
}

/// Compares two (possibly absent) parse trees field-by-field, returning one
/// bool per configured field plus a leading presence bool: both absent
/// compares equal overall; exactly one absent compares unequal; both present
/// compares field-wise.
pub fn compare_parse_trees(
    a: Option<&ParseTree>,
    b: Option<&ParseTree>,
    fields: &[ParseTreeFieldConfig],
) -> Vec<bool> {
    match (a, b) {
        (None, None) => vec![true],
        (None, Some(_)) | (Some(_), None) => vec![false],
        (Some(a), Some(b)) => fields
            .iter()
            .map(|field| field.compare.compare(a.field(&field.name), b.field(&field.name)))
            .collect(),
    }
}

/// An exit status, canonicalized per config: either the raw code, or
/// collapsed to one of two equivalence classes (zero / nonzero), or the
/// distinguished timeout value which never collapses into either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Code(i32),
    TimedOut,
}

impl Status {
    pub fn canonicalize(self, differentiate_nonzero: bool) -> Self {
        match self {
            Status::Code(0) => Status::Code(0),
            Status::Code(_) if !differentiate_nonzero => Status::Code(1),
            other => other,
        }
    }
}

/// A persisted, minimized witness to target disagreement.
#[derive(Debug, Clone)]
pub struct Differential {
    pub bytes: Vec<u8>,
    pub generation: u64,
    pub time_since_start_secs: f64,
}

/// One cumulative coverage sample for a single target, taken once per
/// generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSample {
    pub edges: usize,
    pub time: f64,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(fields: &[(&str, &[u8])]) -> ParseTree {
        ParseTree {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect(),
        }
    }

    #[test]
    fn both_absent_compares_equal() {
        let fields = vec![ParseTreeFieldConfig {
            name: "path".into(),
            compare: FieldCompareMode::Exact,
        }];
        assert_eq!(compare_parse_trees(None, None, &fields), vec![true]);
    }

    #[test]
    fn one_absent_compares_unequal() {
        let fields = vec![ParseTreeFieldConfig {
            name: "path".into(),
            compare: FieldCompareMode::Exact,
        }];
        let t = tree(&[("path", b"/a")]);
        assert_eq!(compare_parse_trees(Some(&t), None, &fields), vec![false]);
    }

    #[test]
    fn treat_absent_and_empty_as_equivalent_mode() {
        let fields = vec![ParseTreeFieldConfig {
            name: "path".into(),
            compare: FieldCompareMode::TreatAbsentAndEmptyAsEquivalent,
        }];
        let a = tree(&[("path", b"")]);
        let b = ParseTree {
            fields: IndexMap::new(),
        };
        assert_eq!(compare_parse_trees(Some(&a), Some(&b), &fields), vec![true]);
    }

    #[test]
    fn reflexivity() {
        let fields = vec![ParseTreeFieldConfig {
            name: "host".into(),
            compare: FieldCompareMode::Exact,
        }];
        let t = tree(&[("host", b"example.com")]);
        assert_eq!(compare_parse_trees(Some(&t), Some(&t), &fields), vec![true]);
    }

    #[test]
    fn status_canonicalization_idempotent() {
        let s = Status::Code(17);
        let once = s.canonicalize(false);
        let twice = once.canonicalize(false);
        assert_eq!(once, twice);
    }

    #[test]
    fn edge_set_union_is_value_equal_regardless_of_construction_order() {
        let a = EdgeSet::from_edges([3, 1, 2]);
        let b = EdgeSet::from_edges([2, 3, 1]);
        assert_eq!(a, b);
        let c = EdgeSet::from_edges([4]);
        assert_eq!(a.union(&c), EdgeSet::from_edges([1, 2, 3, 4]));
    }
}
