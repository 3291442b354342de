//! Unified error type for the engine's public lifecycle operations.
//!
//! Per-file and per-registration faults (see spec §7) are recovered locally
//! and never reach this type — it only covers what can legitimately bubble
//! out of `start`/`stop`/`close`.

use thiserror::Error;

/// All errors that can surface from `Engine` lifecycle operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O failure that isn't isolable to a single file (e.g. the
    /// notification handle itself could not be created).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying filesystem-notification service rejected setup
    /// entirely (not a per-directory registration failure, which is logged
    /// and skipped instead — see `watcher.rs`).
    #[error("filesystem watcher setup failed: {0}")]
    WatcherSetup(#[from] notify::Error),

    /// A shared lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// `start` called from a state other than `New`.
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}
