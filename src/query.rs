//! Query and subscription layer (spec §4.7): `search`, `search_terms`,
//! `watch_for_changes`, `watch_for_word`, `watch_for_words`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::bus::Subscription;
use crate::model::{FileEvent, SearchResult};
use crate::store::IndexStore;
use crate::tokenizer::Tokenizer;

/// Single-term point query. Normalizes `term`, looks up its postings, and
/// emits one `SearchResult` per matching file (order unspecified).
///
/// Built directly from `postings()` under its single lock acquisition: I1
/// already guarantees every path it returns has the token in its forward
/// record, so a separate `lookup` here would just be a second, racy
/// acquisition that a concurrent writer could interleave with (P3, spec §5).
pub fn search(store: &IndexStore, tokenizer: &dyn Tokenizer, term: &str) -> Vec<SearchResult> {
    let normalized = tokenizer.normalize(term);
    store
        .postings(&normalized)
        .into_iter()
        .map(|file| SearchResult {
            file,
            matches: vec![normalized.clone()],
        })
        .collect()
}

/// Ranked multi-term query (spec §4.7 / P4): normalizes and dedups `terms`,
/// accumulates which terms each matching file hit, and sorts by descending
/// match count. Empty input yields an empty result list.
pub fn search_terms(store: &IndexStore, tokenizer: &dyn Tokenizer, terms: &[String]) -> Vec<SearchResult> {
    if terms.is_empty() {
        return Vec::new();
    }
    let normalized: HashSet<String> = terms.iter().map(|t| tokenizer.normalize(t)).collect();
    search_normalized(store, &normalized)
}

fn search_normalized(store: &IndexStore, normalized_terms: &HashSet<String>) -> Vec<SearchResult> {
    use std::collections::HashMap;

    let mut acc: HashMap<String, HashSet<String>> = HashMap::new();
    for term in normalized_terms {
        for path in store.postings(term) {
            acc.entry(path).or_default().insert(term.clone());
        }
    }

    let mut results: Vec<SearchResult> = acc
        .into_iter()
        .map(|(file, matches)| SearchResult {
            file,
            matches: matches.into_iter().collect(),
        })
        .collect();

    results.sort_by(|a, b| b.matches.len().cmp(&a.matches.len()));
    results
}

/// `watchForWord` (spec §4.7): replays the current single-term result set,
/// then emits a `SearchResult` for every subsequent Create/Modify whose
/// resulting token set contains the normalized term. Deletes never emit —
/// the result would reference a file that no longer exists.
pub struct WordWatch {
    initial: std::vec::IntoIter<SearchResult>,
    sub: Subscription,
    term: String,
    store: Arc<IndexStore>,
}

impl WordWatch {
    pub(crate) fn new(store: Arc<IndexStore>, tokenizer: &dyn Tokenizer, sub: Subscription, term: &str) -> Self {
        let normalized = tokenizer.normalize(term);
        let initial = search(&store, tokenizer, term).into_iter();
        WordWatch {
            initial,
            sub,
            term: normalized,
            store,
        }
    }

    /// Cancel the subscription backing this watch. After this, `next()`
    /// only drains whatever initial results remain buffered, then ends.
    pub fn cancel(&self) {
        self.sub.cancel();
    }
}

impl Iterator for WordWatch {
    type Item = SearchResult;

    fn next(&mut self) -> Option<SearchResult> {
        if let Some(result) = self.initial.next() {
            return Some(result);
        }
        loop {
            let event = self.sub.next()?;
            match event {
                FileEvent::Created(path) | FileEvent::Modified(path) => {
                    if let Some(record) = self.store.lookup(&path) {
                        if record.tokens.contains(&self.term) {
                            return Some(SearchResult {
                                file: path,
                                matches: vec![self.term.clone()],
                            });
                        }
                    }
                }
                FileEvent::Deleted(_) => {}
            }
        }
    }
}

/// `watchForWords` (spec §4.7): replays the current ranked multi-term
/// result list once, then re-runs the query and emits the full updated list
/// whenever a bus event plausibly changed it (a Create/Modify touching one
/// of the query terms, or any Delete).
pub struct WordsWatch {
    initial: Option<Vec<SearchResult>>,
    sub: Subscription,
    terms: HashSet<String>,
    store: Arc<IndexStore>,
}

impl WordsWatch {
    pub(crate) fn new(store: Arc<IndexStore>, tokenizer: &dyn Tokenizer, sub: Subscription, terms: &[String]) -> Self {
        let normalized: HashSet<String> = terms.iter().map(|t| tokenizer.normalize(t)).collect();
        let initial = Some(search_normalized(&store, &normalized));
        WordsWatch {
            initial,
            sub,
            terms: normalized,
            store,
        }
    }

    pub fn cancel(&self) {
        self.sub.cancel();
    }
}

impl Iterator for WordsWatch {
    type Item = Vec<SearchResult>;

    fn next(&mut self) -> Option<Vec<SearchResult>> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            let event = self.sub.next()?;
            let relevant = match &event {
                FileEvent::Deleted(_) => true,
                FileEvent::Created(path) | FileEvent::Modified(path) => self
                    .store
                    .lookup(path)
                    .is_some_and(|record| self.terms.iter().any(|t| record.tokens.contains(t))),
            };
            if relevant {
                return Some(search_normalized(&self.store, &self.terms));
            }
        }
    }
}
