//! One-shot initial traversal of the configured root paths (spec §4.4).
//!
//! Non-existent or inaccessible roots are silently skipped — scanning never
//! fails `start`. Walking ignores `.gitignore`/hidden-file conventions: the
//! engine's own `file_filter` is the only filter spec §4.4 names. Symlinks
//! are followed, so one resolving to a regular file reaches `index_file`
//! the same as any other entry (spec §4.3 step 2).

use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, info};

use crate::indexer::index_file;
use crate::store::IndexStore;
use crate::tokenizer::Tokenizer;

/// Scan every configured root, indexing each eligible regular file into
/// `store`. Returns the number of files successfully indexed.
pub fn scan(
    roots: &[std::path::PathBuf],
    store: &IndexStore,
    tokenizer: &dyn Tokenizer,
    file_filter: &dyn Fn(&Path) -> bool,
) -> usize {
    let mut indexed = 0usize;

    for root in roots {
        let metadata = match std::fs::metadata(root) {
            Ok(m) => m,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "skipping inaccessible root");
                continue;
            }
        };

        if metadata.is_file() {
            if let Some(record) = index_file(root, tokenizer, file_filter) {
                store.upsert(record);
                indexed += 1;
            }
            continue;
        }

        if !metadata.is_dir() {
            continue;
        }

        let mut builder = WalkBuilder::new(root);
        builder.standard_filters(false);
        builder.follow_links(true);

        for entry in builder.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "walk entry error, skipping");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            if let Some(record) = index_file(entry.path(), tokenizer, file_filter) {
                store.upsert(record);
                indexed += 1;
            }
        }
    }

    info!(files = indexed, "initial scan complete");
    indexed
}
