//! A pluggable grammar capability for the mutation engine.
//!
//! A [`Grammar`] is built from a top-level regex pattern (with named capture
//! groups) plus a table mapping each of those group names to the regex
//! pattern that describes just that sub-rule. [`Grammar::match_top`] finds
//! which named sub-rules an input actually exercised; [`Grammar::generate`]
//! produces a fresh random byte string matching one named sub-rule by
//! walking its parsed AST (see [`generate`] for the supported constructs).

mod charset;
mod generate;

pub mod default_uri;

use std::ops::Range;

use indexmap::IndexMap;
use rand::Rng;
use regex_syntax::ast::{Ast, parse::Parser as AstParser};

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("failed to parse top-level regex: {0}")]
    InvalidTopRegex(#[source] Box<regex::Error>),
    #[error("failed to parse rule `{rule}` as a regex: {source}")]
    InvalidRulePattern {
        rule: String,
        #[source]
        source: Box<regex_syntax::ast::Error>,
    },
    #[error("no rule named `{0}` is declared in this grammar")]
    UnknownRule(String),
    #[error("unsupported regex construct for byte generation: {0}")]
    UnsupportedConstruct(&'static str),
    #[error("a character class resolved to no candidate bytes")]
    EmptyCharacterClass,
}

struct GrammarRule {
    ast: Ast,
}

/// A regex-derived grammar: a top pattern with named sub-rules that can each
/// be independently regenerated.
pub struct Grammar {
    top: regex::bytes::Regex,
    rules: IndexMap<String, GrammarRule>,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Grammar {
    /// Builds a grammar from a top-level pattern (with named groups) and the
    /// bare pattern text backing each of those groups.
    pub fn new<I, S1, S2>(top_pattern: &str, rule_patterns: I) -> Result<Self, GrammarError>
    where
        I: IntoIterator<Item = (S1, S2)>,
        S1: Into<String>,
        S2: AsRef<str>,
    {
        let top = regex::bytes::Regex::new(top_pattern)
            .map_err(|e| GrammarError::InvalidTopRegex(Box::new(e)))?;

        let mut rules = IndexMap::new();
        for (name, pattern) in rule_patterns {
            let name = name.into();
            let ast = AstParser::new()
                .parse(pattern.as_ref())
                .map_err(|source| GrammarError::InvalidRulePattern {
                    rule: name.clone(),
                    source: Box::new(source),
                })?;
            rules.insert(name, GrammarRule { ast });
        }
        Ok(Self { top, rules })
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Matches the top regex against `input` and reports, for each declared
    /// rule, the byte range it captured -- only rules that actually
    /// participated in the match **and** captured a non-empty span are kept.
    pub fn match_top<'i>(&self, input: &'i [u8]) -> Option<GrammarMatch<'i>> {
        let captures = self.top.captures(input)?;
        let mut matched = IndexMap::new();
        for name in self.rules.keys() {
            if let Some(m) = captures.name(name)
                && !m.is_empty()
            {
                matched.insert(name.clone(), m.start()..m.end());
            }
        }
        Some(GrammarMatch { input, matched })
    }

    /// Generates a fresh random byte string matching the named rule.
    pub fn generate(&self, rule_name: &str, rng: &mut impl Rng) -> Result<Vec<u8>, GrammarError> {
        let rule = self
            .rules
            .get(rule_name)
            .ok_or_else(|| GrammarError::UnknownRule(rule_name.to_owned()))?;
        generate::generate(&rule.ast, rng)
    }
}

/// The result of matching a [`Grammar`]'s top pattern against an input.
#[derive(Debug)]
pub struct GrammarMatch<'i> {
    input: &'i [u8],
    matched: IndexMap<String, Range<usize>>,
}

impl<'i> GrammarMatch<'i> {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Picks one matched named sub-group uniformly at random.
    pub fn pick_random(&self, rng: &mut impl Rng) -> Option<(&str, Range<usize>)> {
        if self.matched.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.matched.len());
        self.matched
            .get_index(index)
            .map(|(name, range)| (name.as_str(), range.clone()))
    }

    pub fn captured_bytes(&self, name: &str) -> Option<&'i [u8]> {
        self.matched.get(name).map(|range| &self.input[range.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn digits_grammar() -> Grammar {
        Grammar::new(
            r"(?P<head>[a-z]+)-(?P<tail>[0-9]{1,3})",
            [("head", "[a-z]+"), ("tail", "[0-9]{3}")],
        )
        .unwrap()
    }

    #[test]
    fn match_top_reports_only_nonempty_named_captures() {
        let grammar = digits_grammar();
        let m = grammar.match_top(b"abc-42").expect("should match");
        assert_eq!(m.captured_bytes("head"), Some(&b"abc"[..]));
        assert_eq!(m.captured_bytes("tail"), Some(&b"42"[..]));
    }

    #[test]
    fn match_top_returns_none_on_total_mismatch() {
        let grammar = digits_grammar();
        assert!(grammar.match_top(b"!!!").is_none());
    }

    #[test]
    fn generate_respects_minimum_repetition_count() {
        let grammar = digits_grammar();
        let mut rng = StdRng::seed_from_u64(7);
        let generated = grammar.generate("tail", &mut rng).unwrap();
        assert_eq!(generated.len(), 3);
        assert!(generated.iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn generate_unknown_rule_errors() {
        let grammar = digits_grammar();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            grammar.generate("nope", &mut rng),
            Err(GrammarError::UnknownRule(_))
        ));
    }
}
