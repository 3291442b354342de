//! The inverted index itself (spec §4.2): a forward map (path → record) and
//! an inverted map (token → posting set), kept symmetric under a single
//! reader/writer lock.
//!
//! # Invariants (spec §3)
//!
//! - **I1 (symmetry)**: `path ∈ inverted[token]` iff `token ∈ forward[path].tokens`.
//! - **I2 (no empty postings)**: a token's posting set is never empty; the
//!   entry is erased instead.
//! - **I3 (single record per path)**: `forward` has at most one entry per path.
//! - **I4 (atomic replacement)**: no reader ever observes a torn update — the
//!   entire remove-then-insert sequence runs under one writer-lock acquisition.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::model::IndexedFile;

struct Inner {
    forward: HashMap<String, IndexedFile>,
    inverted: HashMap<String, HashSet<String>>,
}

/// Multi-reader / single-writer inverted index.
///
/// All writers serialize on the inner lock; readers run concurrently with
/// each other. There is no separate concurrent map layered underneath —
/// the lock alone is the invariant-preserving barrier, per spec §4.2 and
/// the "lock discipline vs. concurrent maps" design note.
pub struct IndexStore {
    inner: RwLock<Inner>,
}

impl Default for IndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStore {
    pub fn new() -> Self {
        IndexStore {
            inner: RwLock::new(Inner {
                forward: HashMap::new(),
                inverted: HashMap::new(),
            }),
        }
    }

    /// Insert or replace the record for `record.path`. Removes stale token
    /// postings from the prior record (if any) and adds postings for the
    /// new token set — all under one writer-lock acquisition, so readers
    /// never see a half-applied update (I4).
    ///
    /// A no-op re-index (identical token set) leaves postings byte-for-byte
    /// unchanged, satisfying P5.
    pub fn upsert(&self, record: IndexedFile) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(prior) = inner.forward.get(&record.path) {
            if prior.tokens == record.tokens && prior.last_modified_ms == record.last_modified_ms
            {
                return;
            }
        }

        if let Some(prior) = inner.forward.remove(&record.path) {
            for token in &prior.tokens {
                Self::remove_posting(&mut inner.inverted, token, &record.path);
            }
        }

        for token in &record.tokens {
            inner
                .inverted
                .entry(token.clone())
                .or_default()
                .insert(record.path.clone());
        }

        inner.forward.insert(record.path.clone(), record);
    }

    /// Remove the record for `path`, pruning it from every posting set that
    /// mentions it. A silent no-op if `path` has no record.
    pub fn remove(&self, path: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(prior) = inner.forward.remove(path) {
            for token in &prior.tokens {
                Self::remove_posting(&mut inner.inverted, token, path);
            }
        }
    }

    fn remove_posting(inverted: &mut HashMap<String, HashSet<String>>, token: &str, path: &str) {
        if let Some(set) = inverted.get_mut(token) {
            set.remove(path);
            if set.is_empty() {
                inverted.remove(token);
            }
        }
    }

    /// Snapshot of the paths whose token set contains `token`. Empty if the
    /// token is absent. Iteration order of the underlying set is
    /// unspecified; callers must not depend on it.
    pub fn postings(&self, token: &str) -> HashSet<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.inverted.get(token).cloned().unwrap_or_default()
    }

    /// Snapshot of the record for `path`, if indexed.
    pub fn lookup(&self, path: &str) -> Option<IndexedFile> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.forward.get(path).cloned()
    }

    /// Number of distinct indexed files.
    pub fn file_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).forward.len()
    }

    /// Number of distinct tokens in the inverted index.
    pub fn token_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).inverted.len()
    }

    /// Drop all indexed state, leaving an empty store. Used by `Engine::close`.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.forward.clear();
        inner.inverted.clear();
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Op {
        Upsert(usize, Vec<usize>),
        Remove(usize),
    }

    const PATHS: usize = 4;
    const TOKENS: usize = 5;

    fn path_of(id: usize) -> String {
        format!("/file{id}.txt")
    }

    fn token_of(id: usize) -> String {
        format!("t{id}")
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..PATHS, proptest::collection::vec(0..TOKENS, 0..TOKENS))
                .prop_map(|(p, ts)| Op::Upsert(p, ts)),
            (0..PATHS).prop_map(Op::Remove),
        ]
    }

    proptest! {
        /// P1 (symmetry) and P2 (no empty postings) after an arbitrary
        /// interleaving of upserts and removes across a small, shared pool
        /// of paths and tokens.
        #[test]
        fn symmetry_and_no_empty_postings_survive_arbitrary_ops(
            ops in proptest::collection::vec(op_strategy(), 0..100)
        ) {
            let store = IndexStore::new();
            for op in ops {
                match op {
                    Op::Upsert(path_id, token_ids) => {
                        let tokens = token_ids.into_iter().map(token_of).collect();
                        store.upsert(IndexedFile {
                            path: path_of(path_id),
                            last_modified_ms: 0,
                            tokens,
                        });
                    }
                    Op::Remove(path_id) => store.remove(&path_of(path_id)),
                }
            }

            // I1, forward -> inverted direction.
            for path_id in 0..PATHS {
                let path = path_of(path_id);
                if let Some(record) = store.lookup(&path) {
                    for token in &record.tokens {
                        prop_assert!(store.postings(token).contains(&path));
                    }
                }
            }

            // I1, inverted -> forward direction, plus I2: every nonempty
            // posting set we observe corresponds to exactly the set of
            // tokens that should be live, with no stray empty entries.
            let mut nonempty_tokens = 0;
            for token_id in 0..TOKENS {
                let token = token_of(token_id);
                let postings = store.postings(&token);
                if !postings.is_empty() {
                    nonempty_tokens += 1;
                }
                for path in &postings {
                    let record = store.lookup(path);
                    prop_assert!(record.is_some_and(|r| r.tokens.contains(&token)));
                }
            }
            prop_assert_eq!(nonempty_tokens, store.token_count());
        }
    }
}
