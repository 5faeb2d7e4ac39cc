//! Byte-level mutation operators, plus an optional grammar-aware operator
//! when a [`Grammar`] capability is configured.

use diffuzz_grammar::Grammar;
use rand::Rng;

fn byte_insert(b: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let index = rng.random_range(0..=b.len());
    let byte = rng.random_range(0..=255u16) as u8;
    let mut out = Vec::with_capacity(b.len() + 1);
    out.extend_from_slice(&b[..index]);
    out.push(byte);
    out.extend_from_slice(&b[index..]);
    out
}

fn byte_change(b: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let index = rng.random_range(0..b.len());
    let mut out = b.to_vec();
    out[index] = rng.random_range(0..=255u16) as u8;
    out
}

fn byte_delete(b: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    let index = rng.random_range(0..b.len());
    let mut out = Vec::with_capacity(b.len() - 1);
    out.extend_from_slice(&b[..index]);
    out.extend_from_slice(&b[index + 1..]);
    out
}

fn grammar_mutate(b: &[u8], grammar: &Grammar, rng: &mut impl Rng) -> Option<Vec<u8>> {
    let m = grammar.match_top(b)?;
    let (rule_name, range) = m.pick_random(rng)?;
    let replacement = grammar.generate(rule_name, rng).ok()?;
    let mut out = Vec::with_capacity(b.len() - (range.end - range.start) + replacement.len());
    out.extend_from_slice(&b[..range.start]);
    out.extend_from_slice(&replacement);
    out.extend_from_slice(&b[range.end..]);
    Some(out)
}

/// Selects and applies one mutation operator uniformly at random from those
/// applicable to `b`'s current length. Empty input degenerates to
/// `byte_insert`, so mutation output is never empty.
pub fn mutate(b: &[u8], grammar: Option<&Grammar>, rng: &mut impl Rng) -> Vec<u8> {
    enum Op {
        Insert,
        Change,
        Delete,
        Grammar,
    }

    let mut ops = vec![Op::Insert];
    if !b.is_empty() {
        ops.push(Op::Change);
    }
    if b.len() > 1 {
        ops.push(Op::Delete);
    }
    let grammar_applicable = grammar.is_some_and(|g| g.match_top(b).is_some());
    if grammar_applicable {
        ops.push(Op::Grammar);
    }

    let chosen = &ops[rng.random_range(0..ops.len())];
    match chosen {
        Op::Insert => byte_insert(b, rng),
        Op::Change => byte_change(b, rng),
        Op::Delete => byte_delete(b, rng),
        Op::Grammar => grammar_mutate(b, grammar.expect("checked applicable above"), rng).unwrap_or_else(|| byte_insert(b, rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn mutation_of_empty_input_is_never_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let result = mutate(b"", None, &mut rng);
            assert!(!result.is_empty());
        }
    }

    #[test]
    fn single_byte_input_never_uses_delete() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let result = mutate(b"x", None, &mut rng);
            assert!(!result.is_empty());
        }
    }

    #[test]
    fn byte_delete_shrinks_by_exactly_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let out = byte_delete(b"abcd", &mut rng);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn byte_insert_grows_by_exactly_one() {
        let mut rng = StdRng::seed_from_u64(4);
        let out = byte_insert(b"abcd", &mut rng);
        assert_eq!(out.len(), 5);
    }
}
