//! Engine lifecycle and configuration (spec §4.8, §4.11): the public façade
//! that wires `Scanner`, the watcher adapter, `IndexStore`, the event bus,
//! and the query layer together behind `New → Running → Stopped`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::model::{IndexedFile, SearchResult};
use crate::query::{self, WordWatch, WordsWatch};
use crate::scanner;
use crate::store::IndexStore;
use crate::tokenizer::{DefaultTokenizer, Tokenizer};
use crate::watcher::{self, WatcherHandle};

const DEFAULT_SUBSCRIBER_BUFFER: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Running,
    Stopped,
}

/// Snapshot of index size at the moment it's requested. Not part of the
/// query layer proper — a read-only observability accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub files: usize,
    pub tokens: usize,
}

/// Configures and constructs an [`Engine`]. Validation is permissive: zero
/// roots is accepted (the engine simply indexes and watches nothing), not
/// rejected — a `ConfigurationFault` is logged, not propagated.
pub struct EngineBuilder {
    roots: Vec<PathBuf>,
    tokenizer: Arc<dyn Tokenizer>,
    file_filter: Arc<dyn Fn(&Path) -> bool + Send + Sync>,
    subscriber_buffer: usize,
}

/// Default file-path predicate (spec §6): accepts paths ending in `.txt`.
fn default_file_filter(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "txt")
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder {
            roots: Vec::new(),
            tokenizer: Arc::new(DefaultTokenizer),
            file_filter: Arc::new(default_file_filter),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filesystem root to scan and watch. Repeatable.
    pub fn add_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Replace the default tokenizer.
    pub fn tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    /// Restrict which files get indexed. Defaults to paths ending in `.txt`
    /// (see `default_file_filter`).
    pub fn file_filter(mut self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.file_filter = Arc::new(filter);
        self
    }

    /// Per-subscriber buffer capacity (spec §4.6's "implementation-defined
    /// capacity, target ≥ 100 events"). Defaults to 128.
    pub fn subscriber_buffer(mut self, capacity: usize) -> Self {
        self.subscriber_buffer = capacity.max(1);
        self
    }

    pub fn build(self) -> Engine {
        if self.roots.is_empty() {
            warn!("engine built with no configured roots; nothing will be scanned or watched");
        }
        Engine {
            roots: self.roots,
            tokenizer: self.tokenizer,
            file_filter: self.file_filter,
            store: Arc::new(IndexStore::new()),
            bus: EventBus::new(self.subscriber_buffer),
            state: Mutex::new(State::New),
            watcher_handle: Mutex::new(None),
        }
    }
}

/// The embeddable engine: owns the index, the event bus, and (once started)
/// the watcher thread. `search`/`search_terms` are synchronous point-in-time
/// reads; `watch_*` return lazy, cancellable subscriptions.
pub struct Engine {
    roots: Vec<PathBuf>,
    tokenizer: Arc<dyn Tokenizer>,
    file_filter: Arc<dyn Fn(&Path) -> bool + Send + Sync>,
    store: Arc<IndexStore>,
    bus: EventBus,
    state: Mutex<State>,
    watcher_handle: Mutex<Option<WatcherHandle>>,
}

impl Engine {
    /// Scan every configured root to completion, then open the watcher.
    /// Only valid from the `New` state; returns `InvalidState` otherwise.
    ///
    /// Roots are canonicalized once here (falling back to the configured
    /// path if canonicalization fails) and that resolved form is handed to
    /// both the scanner and the watcher, so a file discovered by the initial
    /// scan and the same file reported later by a filesystem event always
    /// resolve to the identical path string (spec §9's path-identity note).
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != State::New {
            return Err(EngineError::InvalidState(format!(
                "start() requires the New state, found {:?}",
                *state
            )));
        }

        let resolved_roots: Vec<PathBuf> = self
            .roots
            .iter()
            .map(|r| std::fs::canonicalize(r).unwrap_or_else(|_| r.clone()))
            .collect();

        scanner::scan(&resolved_roots, &self.store, self.tokenizer.as_ref(), self.file_filter.as_ref());

        let handle = watcher::start(
            resolved_roots,
            Arc::clone(&self.store),
            self.bus.clone(),
            Arc::clone(&self.tokenizer),
            Arc::clone(&self.file_filter),
        )?;

        *self.watcher_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        *state = State::Running;
        Ok(())
    }

    /// Tear down the watcher. The index and any live subscriptions are left
    /// untouched — only `close` discards those. Idempotent; safe to call
    /// from any state.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == State::Stopped {
            return;
        }
        if let Some(mut handle) = self.watcher_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.stop();
        }
        *state = State::Stopped;
    }

    /// `stop`, then discard the index and end every live subscription.
    /// Searches and watches issued after this return empty / end immediately.
    pub fn close(&self) {
        self.stop();
        self.store.clear();
        self.bus.shutdown();
    }

    pub fn search(&self, term: &str) -> Vec<SearchResult> {
        query::search(&self.store, self.tokenizer.as_ref(), term)
    }

    pub fn search_terms(&self, terms: &[String]) -> Vec<SearchResult> {
        query::search_terms(&self.store, self.tokenizer.as_ref(), terms)
    }

    pub fn watch_for_changes(&self) -> crate::bus::Subscription {
        self.bus.subscribe()
    }

    pub fn watch_for_word(&self, term: &str) -> WordWatch {
        let sub = self.bus.subscribe();
        WordWatch::new(Arc::clone(&self.store), self.tokenizer.as_ref(), sub, term)
    }

    pub fn watch_for_words(&self, terms: &[String]) -> WordsWatch {
        let sub = self.bus.subscribe();
        WordsWatch::new(Arc::clone(&self.store), self.tokenizer.as_ref(), sub, terms)
    }

    pub fn index_stats(&self) -> IndexStats {
        IndexStats {
            files: self.store.file_count(),
            tokens: self.store.token_count(),
        }
    }

    /// Directly upsert an already-built record, bypassing the filesystem
    /// pipeline. Exposed mainly for embedders that source content outside
    /// the configured roots; the watcher and scanner use the same
    /// `IndexStore` underneath.
    pub fn upsert(&self, record: IndexedFile) {
        self.store.upsert(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn start_then_search_finds_scanned_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello rust world").unwrap();

        let engine = EngineBuilder::new().add_root(dir.path()).build();
        engine.start().unwrap();

        let results = engine.search("rust");
        assert_eq!(results.len(), 1);
        engine.stop();
    }

    #[test]
    fn start_twice_returns_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new().add_root(dir.path()).build();
        engine.start().unwrap();
        let err = engine.start().unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        engine.stop();
    }

    #[test]
    fn stop_is_idempotent_and_callable_before_start() {
        let engine = EngineBuilder::new().build();
        engine.stop();
        engine.stop();
    }

    #[test]
    fn close_clears_index_and_ends_subscriptions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "durable").unwrap();

        let engine = EngineBuilder::new().add_root(dir.path()).build();
        engine.start().unwrap();
        assert_eq!(engine.index_stats().files, 1);

        let mut sub = engine.watch_for_changes();
        engine.close();

        assert!(engine.search("durable").is_empty());
        assert_eq!(sub.next(), None);
    }

    #[test]
    fn builder_with_no_roots_starts_cleanly() {
        let engine = EngineBuilder::new().build();
        engine.start().unwrap();
        assert_eq!(engine.index_stats().files, 0);
        engine.stop();
    }
}
