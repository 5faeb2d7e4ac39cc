use rand::Rng;
use regex_syntax::ast::{
    Alternation, Ast, ClassPerlKind, ClassSet, ClassSetBinaryOpKind, ClassSetItem, Concat,
    Literal, Repetition, RepetitionKind, RepetitionRange,
};

use crate::charset::CharacterSet;
use crate::GrammarError;

/// Walks a parsed regex AST and emits one sampled byte string per leaf,
/// following the same rules a matching string would have to obey.
///
/// Only the constructs actually needed to generate byte strings are
/// supported; anchors, word boundaries and Unicode categories make no sense
/// for a byte-oriented generator and are rejected.
pub(crate) fn generate(ast: &Ast, rng: &mut impl Rng) -> Result<Vec<u8>, GrammarError> {
    match ast {
        Ast::Empty(_) => Ok(Vec::new()),
        Ast::Flags(_) => Err(GrammarError::UnsupportedConstruct("inline flags")),
        Ast::Literal(literal) => Ok(generate_literal(literal)),
        Ast::Dot(_) => Ok(vec![rng.random_range(0..=255)]),
        Ast::Assertion(_) => Err(GrammarError::UnsupportedConstruct("anchor or word boundary")),
        Ast::ClassUnicode(_) => Err(GrammarError::UnsupportedConstruct("unicode category")),
        Ast::ClassPerl(class) => {
            let set = perl_class_set(&class.kind, class.negated);
            Ok(vec![sample(&set, rng)?])
        }
        Ast::ClassBracketed(class) => {
            let mut set = translate_class_set(&class.kind)?;
            if class.negated {
                set = set.negate();
            }
            Ok(vec![sample(&set, rng)?])
        }
        Ast::Repetition(repetition) => generate_repetition(repetition, rng),
        Ast::Group(group) => generate(&group.ast, rng),
        Ast::Alternation(alternation) => generate_alternation(alternation, rng),
        Ast::Concat(concat) => generate_concat(concat, rng),
    }
}

fn generate_literal(literal: &Literal) -> Vec<u8> {
    let mut buf = [0u8; 4];
    literal.c.encode_utf8(&mut buf).as_bytes().to_vec()
}

fn generate_repetition(repetition: &Repetition, rng: &mut impl Rng) -> Result<Vec<u8>, GrammarError> {
    let count = match repetition.op.kind {
        RepetitionKind::ZeroOrOne => 0,
        RepetitionKind::ZeroOrMore => 0,
        RepetitionKind::OneOrMore => 1,
        RepetitionKind::Range(RepetitionRange::Exactly(n)) => n,
        RepetitionKind::Range(RepetitionRange::AtLeast(n)) => n,
        RepetitionKind::Range(RepetitionRange::Bounded(min, _)) => min,
    };
    let mut out = Vec::new();
    for _ in 0..count {
        out.extend(generate(&repetition.ast, rng)?);
    }
    Ok(out)
}

fn generate_alternation(alternation: &Alternation, rng: &mut impl Rng) -> Result<Vec<u8>, GrammarError> {
    let index = rng.random_range(0..alternation.asts.len());
    generate(&alternation.asts[index], rng)
}

fn generate_concat(concat: &Concat, rng: &mut impl Rng) -> Result<Vec<u8>, GrammarError> {
    let mut out = Vec::new();
    for ast in &concat.asts {
        out.extend(generate(ast, rng)?);
    }
    Ok(out)
}

fn sample(set: &CharacterSet, rng: &mut impl Rng) -> Result<u8, GrammarError> {
    if set.is_empty() {
        return Err(GrammarError::EmptyCharacterClass);
    }
    let index = rng.random_range(0..set.len());
    set.bytes().nth(index).ok_or(GrammarError::EmptyCharacterClass)
}

fn perl_class_set(kind: &ClassPerlKind, negated: bool) -> CharacterSet {
    let set = match kind {
        ClassPerlKind::Digit => CharacterSet::empty().add_range(b'0', b'9'),
        ClassPerlKind::Space => CharacterSet::empty()
            .add_byte(b' ')
            .add_byte(b'\t')
            .add_byte(b'\r')
            .add_byte(b'\n')
            .add_byte(0x0B)
            .add_byte(0x0C),
        ClassPerlKind::Word => CharacterSet::empty()
            .add_byte(b'_')
            .add_range(b'A', b'Z')
            .add_range(b'a', b'z')
            .add_range(b'0', b'9'),
    };
    if negated { set.negate() } else { set }
}

fn translate_class_set(class_set: &ClassSet) -> Result<CharacterSet, GrammarError> {
    match class_set {
        ClassSet::Item(item) => expand_character_class(item),
        ClassSet::BinaryOp(binary_op) => {
            let lhs = translate_class_set(&binary_op.lhs)?;
            let rhs = translate_class_set(&binary_op.rhs)?;
            Ok(match binary_op.kind {
                ClassSetBinaryOpKind::Intersection => lhs.intersection(&rhs),
                ClassSetBinaryOpKind::Difference => lhs.difference(&rhs),
                ClassSetBinaryOpKind::SymmetricDifference => lhs.symmetric_difference(&rhs),
            })
        }
    }
}

fn expand_character_class(item: &ClassSetItem) -> Result<CharacterSet, GrammarError> {
    match item {
        ClassSetItem::Empty(_) => Ok(CharacterSet::empty()),
        ClassSetItem::Literal(literal) => {
            Ok(CharacterSet::empty().union(&byte_literal_set(literal.c)))
        }
        ClassSetItem::Range(range) => Ok(byte_range_set(range.start.c, range.end.c)),
        ClassSetItem::Union(union) => {
            let mut set = CharacterSet::empty();
            for item in &union.items {
                set = set.union(&expand_character_class(item)?);
            }
            Ok(set)
        }
        ClassSetItem::Perl(class) => Ok(perl_class_set(&class.kind, class.negated)),
        ClassSetItem::Unicode(_) => Err(GrammarError::UnsupportedConstruct("unicode category")),
        ClassSetItem::Bracketed(class) => {
            let mut set = translate_class_set(&class.kind)?;
            if class.negated {
                set = set.negate();
            }
            Ok(set)
        }
        ClassSetItem::Ascii(_) => Err(GrammarError::UnsupportedConstruct("posix ascii class")),
    }
}

fn byte_literal_set(c: char) -> CharacterSet {
    let mut buf = [0u8; 4];
    let mut set = CharacterSet::empty();
    for byte in c.encode_utf8(&mut buf).as_bytes() {
        set = set.add_byte(*byte);
    }
    set
}

fn byte_range_set(start: char, end: char) -> CharacterSet {
    if start.is_ascii() && end.is_ascii() {
        CharacterSet::empty().add_range(start as u8, end as u8)
    } else {
        CharacterSet::empty()
    }
}
