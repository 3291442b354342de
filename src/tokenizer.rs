//! Pluggable tokenizer contract (spec §4.1) and the default implementation.

use std::collections::HashSet;

/// Pure string → token-set extraction, plus the query-side normalization
/// used to look terms up in the index.
///
/// Correctness requires `tokenize` to already emit normalized tokens:
/// `normalize(t) == t` for every `t` produced by `tokenize`. The engine
/// never re-normalizes tokens it stores — only query terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, content: &str) -> HashSet<String>;
    fn normalize(&self, term: &str) -> String;
}

/// Lowercases and splits on maximal runs of non-word characters, returning
/// the non-empty pieces as a set (duplicates within a file collapse —
/// frequency is not tracked, matching spec §4.1).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

impl DefaultTokenizer {
    fn normalize_word(word: &str) -> String {
        word.to_lowercase()
    }
}

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, content: &str) -> HashSet<String> {
        content
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| !s.is_empty())
            .map(Self::normalize_word)
            .collect()
    }

    fn normalize(&self, term: &str) -> String {
        Self::normalize_word(term)
    }
}
