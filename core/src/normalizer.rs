use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Tokens shorter than this (in bytes, which equals chars after folding) are dropped.
pub const MIN_TOKEN_LEN: usize = 3;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9\s]").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    // Stored folded: entries are compared against normalized tokens.
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","o","e","de","da","do","das","dos","em","para","por","com","no","na",
            "nos","nas","um","uma","uns","umas","se","que","quando","onde","como","mais",
            "muito","mas","ou","pelo","pela","pelos","pelas","ao","aos","as","ser","estar",
            "ter","haver","seu","sua","seus","suas","meu","minha","meus","minhas","nosso",
            "nossa","nossos","nossas","ele","ela","eles","elas","este","esta","estes",
            "estas","esse","essa","esses","essas","aquele","aquela","aqueles","aquelas",
            "foi","foram","sendo","sido"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Lowercase, strip diacritics, replace everything outside `[a-z0-9]` and whitespace
/// with a space, then collapse whitespace. Idempotent.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let cleaned = NON_ALNUM.replace_all(&folded, " ");
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// Normalize and split into index tokens, dropping short words and stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_case() {
        assert_eq!(normalize("Saúde"), "saude");
        assert_eq!(normalize("SAÚDE"), normalize("saude"));
        assert_eq!(normalize("Ação, coração!"), "acao coracao");
    }

    #[test]
    fn replaces_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("  conselho\t\tnacional -- (CNS)  "), "conselho nacional cns");
        assert_eq!(normalize("n.º 466/2012"), "n o 466 2012");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n ").is_empty());
    }

    #[test]
    fn drops_short_tokens_and_stopwords() {
        let toks = tokenize("A saúde dos povos é para todos");
        assert_eq!(toks, vec!["saude", "povos", "todos"]);
    }
}
