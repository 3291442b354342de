//! # reactive-index
//!
//! Embeddable in-memory inverted text index over a set of filesystem roots,
//! kept consistent with storage via filesystem-change notifications. Exposes
//! synchronous point queries, ranked multi-term queries, and reactive
//! subscriptions over the same index.
//!
//! ## Library usage
//!
//! This crate has no CLI or persistence layer of its own — it is meant to be
//! embedded directly. Construct an [`Engine`] with [`EngineBuilder`], call
//! [`Engine::start`], then query or subscribe against it for as long as it
//! runs.
//!
//! ```no_run
//! use reactive_index::EngineBuilder;
//!
//! let engine = EngineBuilder::new()
//!     .add_root("./docs")
//!     .build();
//! engine.start().unwrap();
//!
//! for result in engine.search("rust") {
//!     println!("{}", result.file);
//! }
//! ```

mod bus;
mod engine;
mod error;
mod indexer;
mod model;
mod query;
mod scanner;
mod store;
mod tokenizer;
mod watcher;

pub use bus::Subscription;
pub use engine::{Engine, EngineBuilder, IndexStats};
pub use error::EngineError;
pub use model::{FileEvent, IndexedFile, SearchResult};
pub use query::{WordWatch, WordsWatch};
pub use tokenizer::{DefaultTokenizer, Tokenizer};
