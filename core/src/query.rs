//! Boolean query language: bare words, `AND` / `OR` / `NOT`, quoted phrases and
//! parenthesized groups.
//!
//! Within a group (and at the top level) the items are first split on `OR`. Each
//! resulting clause intersects its positive operands and then subtracts every operand
//! introduced by `NOT`. `OR` therefore always binds loosest across a whole group,
//! and a clause without any positive operand matches nothing.

use crate::index::{InvertedIndex, PostingSet};
use crate::normalizer::{normalize, tokenize};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref PHRASE_RE: Regex = Regex::new(r#""([^"]+)""#).expect("valid regex");
}

const AND: &str = "AND";
const OR: &str = "OR";
const NOT: &str = "NOT";

/// Deepest parenthesis nesting accepted. Deeper queries match nothing.
pub const MAX_DEPTH: usize = 64;

/// Returns true for the case-sensitive operator keywords.
pub fn is_operator(word: &str) -> bool {
    matches!(word, AND | OR | NOT)
}

/// Parsed query tree. `And` and `Or` are n-ary, so tree depth follows
/// parenthesis nesting only.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Term(String),
    Phrase(String),
    /// Intersection of the operands, minus every `Not` operand.
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// Exclusion. Only meaningful as an operand of `And`.
    Not(Box<Expr>),
    /// Matches nothing: empty groups, operator-only clauses.
    Empty,
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, operands: &[Expr]) -> fmt::Result {
    write!(f, "({op}")?;
    for operand in operands {
        write!(f, " {operand}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(t) => write!(f, "{t}"),
            Self::Phrase(p) => write!(f, "\"{p}\""),
            Self::And(operands) => write_list(f, "and", operands),
            Self::Or(operands) => write_list(f, "or", operands),
            Self::Not(x) => write!(f, "(not {x})"),
            Self::Empty => write!(f, "()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `(` without a matching `)`.
    UnclosedGroup { depth: usize },
    /// Nesting beyond `MAX_DEPTH`.
    TooDeep,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclosedGroup { depth } => {
                write!(f, "unclosed parenthesis at nesting depth {depth}")
            }
            Self::TooDeep => write!(f, "parentheses nested deeper than {MAX_DEPTH}"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Phrase(String),
    Open,
    Close,
}

fn lex(query: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in PHRASE_RE.captures_iter(query) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        lex_plain(&query[last..whole.start()], &mut tokens);
        tokens.push(Token::Phrase(inner.as_str().to_string()));
        last = whole.end();
    }
    lex_plain(&query[last..], &mut tokens);
    tokens
}

// Unmatched quote characters stay inside ordinary words.
fn lex_plain(text: &str, tokens: &mut Vec<Token>) {
    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    let mut word = String::new();
    for c in text.chars() {
        match c {
            '(' => {
                flush(&mut word, tokens);
                tokens.push(Token::Open);
            }
            ')' => {
                flush(&mut word, tokens);
                tokens.push(Token::Close);
            }
            c if c.is_whitespace() => flush(&mut word, tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, tokens);
}

/// One element of a flat (paren-free) sequence: a keyword or a resolved operand.
#[derive(Debug)]
enum Item {
    And,
    Or,
    Not,
    Operand(Expr),
}

impl Item {
    // A keyword used as an operand is looked up as a plain word.
    fn into_operand(self) -> Expr {
        match self {
            Self::And => Expr::Term(AND.to_string()),
            Self::Or => Expr::Term(OR.to_string()),
            Self::Not => Expr::Term(NOT.to_string()),
            Self::Operand(expr) => expr,
        }
    }
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
}

impl Parser {
    fn parse_sequence(&mut self, depth: usize) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.tokens.next() {
                None if depth > 0 => return Err(ParseError::UnclosedGroup { depth }),
                None => break,
                Some(Token::Close) if depth > 0 => break,
                // Stray closing parenthesis at top level.
                Some(Token::Close) => {}
                Some(Token::Open) if depth >= MAX_DEPTH => return Err(ParseError::TooDeep),
                Some(Token::Open) => {
                    items.push(Item::Operand(self.parse_sequence(depth + 1)?));
                }
                Some(Token::Phrase(p)) => items.push(Item::Operand(Expr::Phrase(p))),
                Some(Token::Word(w)) => items.push(match w.as_str() {
                    AND => Item::And,
                    OR => Item::Or,
                    NOT => Item::Not,
                    _ => Item::Operand(Expr::Term(w)),
                }),
            }
        }
        Ok(flatten(items))
    }
}

fn flatten(items: Vec<Item>) -> Expr {
    let mut clauses = Vec::new();
    let mut current = Vec::new();
    for item in items {
        if matches!(item, Item::Or) {
            clauses.push(clause(std::mem::take(&mut current)));
        } else {
            current.push(item);
        }
    }
    clauses.push(clause(current));

    let mut clauses: Vec<Expr> = clauses.into_iter().filter(|c| *c != Expr::Empty).collect();
    match clauses.len() {
        0 => Expr::Empty,
        1 => clauses.remove(0),
        _ => Expr::Or(clauses),
    }
}

fn clause(items: Vec<Item>) -> Expr {
    // Keywords alone never match anything.
    if !items.iter().any(|item| matches!(item, Item::Operand(_))) {
        return Expr::Empty;
    }

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut items = items.into_iter();
    while let Some(item) = items.next() {
        match item {
            Item::And => {}
            // A trailing NOT has nothing to consume and stays a literal word.
            Item::Not => match items.next() {
                Some(next) => negative.push(Expr::Not(Box::new(next.into_operand()))),
                None => positive.push(Expr::Term(NOT.to_string())),
            },
            other => positive.push(other.into_operand()),
        }
    }

    if positive.is_empty() {
        return Expr::Empty;
    }
    if positive.len() == 1 && negative.is_empty() {
        return positive.remove(0);
    }
    positive.extend(negative);
    Expr::And(positive)
}

/// Parse a raw query string. Fails on an unclosed `(` or on nesting beyond `MAX_DEPTH`.
pub fn parse(query: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser { tokens: lex(query).into_iter() };
    parser.parse_sequence(0)
}

/// Evaluate a parsed expression against the index.
pub fn evaluate(expr: &Expr, index: &InvertedIndex) -> PostingSet {
    match expr {
        Expr::Term(term) => index.lookup_term(term),
        Expr::Phrase(phrase) => search_phrase(index, phrase),
        Expr::And(operands) => {
            let mut result: Option<PostingSet> = None;
            for operand in operands.iter().filter(|e| !matches!(e, Expr::Not(_))) {
                let matched = evaluate(operand, index);
                let narrowed = match result {
                    None => matched,
                    Some(acc) => acc.intersection(&matched).copied().collect(),
                };
                if narrowed.is_empty() {
                    return narrowed;
                }
                result = Some(narrowed);
            }
            let mut result = result.unwrap_or_default();
            for operand in operands {
                if let Expr::Not(excluded) = operand {
                    let excluded = evaluate(excluded, index);
                    result.retain(|id| !excluded.contains(id));
                }
            }
            result
        }
        Expr::Or(operands) => {
            let mut result = PostingSet::new();
            for operand in operands {
                result.extend(evaluate(operand, index));
            }
            result
        }
        Expr::Not(_) | Expr::Empty => PostingSet::new(),
    }
}

/// Parse and evaluate. Malformed nesting yields the empty set.
pub fn search(index: &InvertedIndex, query: &str) -> PostingSet {
    match parse(query) {
        Ok(expr) => {
            tracing::debug!(%expr, "parsed query");
            evaluate(&expr, index)
        }
        Err(err) => {
            tracing::warn!(error = %err, "malformed query, no results");
            PostingSet::new()
        }
    }
}

/// Exact phrase match on normalized `title + body`.
///
/// The first phrase token's postings narrow the candidates; each candidate is then
/// checked for the normalized phrase as a contiguous substring.
pub fn search_phrase(index: &InvertedIndex, phrase: &str) -> PostingSet {
    let tokens = tokenize(phrase);
    let Some(first) = tokens.first() else {
        return PostingSet::new();
    };
    let Some(candidates) = index.postings_for(first) else {
        return PostingSet::new();
    };
    let needle = normalize(phrase);
    candidates
        .iter()
        .copied()
        .filter(|&doc_id| {
            index
                .normalized_content(doc_id)
                .is_some_and(|content| content.contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str) -> Expr {
        Expr::Term(t.to_string())
    }

    fn and(operands: Vec<Expr>) -> Expr {
        Expr::And(operands)
    }

    fn or(operands: Vec<Expr>) -> Expr {
        Expr::Or(operands)
    }

    fn not(x: Expr) -> Expr {
        Expr::Not(Box::new(x))
    }

    #[test]
    fn lexes_phrases_before_words() {
        let tokens = lex(r#"("saúde (pública)" OR x)"#);
        assert_eq!(
            tokens,
            vec![
                Token::Open,
                Token::Phrase("saúde (pública)".into()),
                Token::Word("OR".into()),
                Token::Word("x".into()),
                Token::Close,
            ]
        );
    }

    #[test]
    fn unclosed_quote_is_a_plain_word() {
        assert_eq!(
            lex(r#""saúde mental"#),
            vec![Token::Word("\"saúde".into()), Token::Word("mental".into())]
        );
    }

    #[test]
    fn and_not_chain() {
        assert_eq!(
            parse("a AND b NOT c").unwrap(),
            and(vec![term("a"), term("b"), not(term("c"))])
        );
    }

    #[test]
    fn negatives_apply_after_all_positives() {
        assert_eq!(
            parse("a NOT c b").unwrap(),
            and(vec![term("a"), term("b"), not(term("c"))])
        );
    }

    #[test]
    fn or_splits_the_whole_group() {
        assert_eq!(
            parse("a AND b OR c NOT d").unwrap(),
            or(vec![
                and(vec![term("a"), term("b")]),
                and(vec![term("c"), not(term("d"))]),
            ])
        );
    }

    #[test]
    fn groups_nest() {
        assert_eq!(
            parse("(a AND (b OR c)) NOT d").unwrap(),
            and(vec![
                and(vec![term("a"), or(vec![term("b"), term("c")])]),
                not(term("d")),
            ])
        );
        assert_eq!(parse("(a)").unwrap(), parse("a").unwrap());
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            parse("a or b").unwrap(),
            and(vec![term("a"), term("or"), term("b")])
        );
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(parse("").unwrap(), Expr::Empty);
        assert_eq!(parse("AND OR NOT").unwrap(), Expr::Empty);
        assert_eq!(parse("NOT").unwrap(), Expr::Empty);
        assert_eq!(parse("NOT a").unwrap(), Expr::Empty);
        assert_eq!(parse("a AND ()").unwrap(), and(vec![term("a"), Expr::Empty]));
        assert_eq!(
            parse("a NOT AND").unwrap(),
            and(vec![term("a"), not(term("AND"))])
        );
    }

    #[test]
    fn trailing_not_is_a_literal_word() {
        assert_eq!(parse("a NOT").unwrap(), and(vec![term("a"), term("NOT")]));
        assert_eq!(
            parse("a NOT b NOT").unwrap(),
            and(vec![term("a"), term("NOT"), not(term("b"))])
        );
    }

    #[test]
    fn unbalanced_parentheses() {
        assert_eq!(
            parse("saúde AND (mental"),
            Err(ParseError::UnclosedGroup { depth: 1 })
        );
        assert_eq!(
            parse("saúde AND mental)").unwrap(),
            and(vec![term("saúde"), term("mental")])
        );
    }

    #[test]
    fn nesting_is_capped() {
        let at_cap = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(parse(&at_cap).unwrap(), term("a"));
        let beyond = format!("{}a{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&beyond), Err(ParseError::TooDeep));
        assert_eq!(parse(&"(".repeat(100_000)), Err(ParseError::TooDeep));
    }

    #[test]
    fn long_chains_stay_flat() {
        let query = vec!["a"; 10_000].join(" OR ");
        match parse(&query).unwrap() {
            Expr::Or(operands) => assert_eq!(operands.len(), 10_000),
            other => panic!("expected a flat OR, got {other:?}"),
        }
    }

    #[test]
    fn display_renders_tree() {
        let expr = parse(r#""a b" OR c NOT d"#).unwrap();
        assert_eq!(expr.to_string(), r#"(or "a b" (and c (not d)))"#);
    }
}
