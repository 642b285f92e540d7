use crate::normalizer::{normalize, tokenize};
use crate::query::is_operator;
use crate::Document;
use std::collections::{HashMap, HashSet};

pub const TITLE_WEIGHT: f64 = 3.0;
pub const BODY_WEIGHT: f64 = 1.0;
pub const SNIPPET_LENGTH: usize = 200;
pub const SNIPPET_STRIDE: usize = 20;

const ELLIPSIS: &str = "...";

/// Tokens used for scoring and snippets: the query's words minus operator keywords.
pub fn query_tokens(query: &str) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().filter(|w| !is_operator(w)).collect();
    tokenize(&words.join(" "))
}

/// Title hits weigh `TITLE_WEIGHT` each; body hits add `BODY_WEIGHT` per occurrence.
/// A document with no overlap scores 0.0.
pub fn score(doc: &Document, query_tokens: &[String]) -> f64 {
    let title = normalize(&doc.title);
    let mut body_counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(&doc.body) {
        *body_counts.entry(token).or_insert(0) += 1;
    }

    let mut score = 0.0;
    for token in query_tokens {
        if title.contains(token.as_str()) {
            score += TITLE_WEIGHT;
        }
        let count = body_counts.get(token).copied().unwrap_or(0);
        score += BODY_WEIGHT * count as f64;
    }
    score
}

/// Best `max_length`-character window of the raw body, scanned in `SNIPPET_STRIDE` steps
/// and scored by the number of distinct query tokens it contains. Ties keep the earliest.
pub fn extract_snippet(body: &str, query_tokens: &[String], max_length: usize) -> String {
    // Byte offset of every char, plus the end of the string.
    let bounds: Vec<usize> = body
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(body.len()))
        .collect();
    let char_len = bounds.len() - 1;
    let slice = |start: usize, len: usize| char_slice(body, &bounds, start, len);

    if query_tokens.is_empty() || body.is_empty() {
        if char_len > max_length {
            return format!("{}{ELLIPSIS}", slice(0, max_length));
        }
        return body.to_string();
    }

    let distinct: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
    let mut best_start = 0;
    let mut max_matches = 0;
    let mut start = 0;
    while start + max_length < char_len {
        let window = normalize(slice(start, max_length));
        let matches = distinct.iter().filter(|t| window.contains(**t)).count();
        if matches > max_matches {
            max_matches = matches;
            best_start = start;
        }
        start += SNIPPET_STRIDE;
    }

    let mut snippet = String::new();
    if best_start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(slice(best_start, max_length));
    if best_start + max_length < char_len {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn char_slice<'a>(text: &'a str, bounds: &[usize], start: usize, len: usize) -> &'a str {
    let last = bounds.len() - 1;
    &text[bounds[start.min(last)]..bounds[(start + len).min(last)]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn title_and_body_weights() {
        let d1 = Document::new(0, "Residência em Medicina", "");
        let d2 = Document::new(1, "", "medicina medicina, Medicina; MEDICINA e medicina");
        let q = tokens(&["medicina"]);
        assert_eq!(score(&d1, &q), 3.0);
        assert_eq!(score(&d2, &q), 5.0);
    }

    #[test]
    fn no_overlap_scores_zero() {
        let doc = Document::new(0, "Conselho", "Nacional de Saúde");
        assert_eq!(score(&doc, &tokens(&["farmacia"])), 0.0);
    }

    #[test]
    fn query_tokens_skip_operators() {
        assert_eq!(
            query_tokens(r#"(saúde AND "mental") NOT privado or"#),
            vec!["saude", "mental", "privado"]
        );
    }

    #[test]
    fn short_body_is_returned_whole() {
        let body = "Dispõe sobre saúde mental.";
        assert_eq!(extract_snippet(body, &tokens(&["saude"]), 200), body);
        assert_eq!(extract_snippet(body, &[], 200), body);
    }

    #[test]
    fn empty_tokens_truncate_from_start() {
        let body = "x".repeat(250);
        let snippet = extract_snippet(&body, &[], 200);
        assert_eq!(snippet, format!("{}...", "x".repeat(200)));
    }

    #[test]
    fn window_moves_to_matches() {
        let body = format!("{} saúde mental {}", "a".repeat(300), "b".repeat(300));
        let snippet = extract_snippet(&body, &tokens(&["saude", "mental"]), 200);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("saúde mental"));
        assert_eq!(snippet.chars().count(), 206);
    }

    #[test]
    fn ties_keep_earliest_window() {
        let body = format!("saude {}", "z".repeat(400));
        let snippet = extract_snippet(&body, &tokens(&["saude"]), 200);
        assert!(snippet.starts_with("saude"));
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn multibyte_bodies_slice_on_char_boundaries() {
        let body = "ção ".repeat(100);
        let snippet = extract_snippet(&body, &tokens(&["nada"]), 50);
        let head: String = body.chars().take(50).collect();
        assert_eq!(snippet, format!("{head}..."));
    }
}
