//! Per-file indexing pipeline (spec §4.3): read → tokenize → build record.
//!
//! Every fault here — missing file, permission denied, a decode error, a
//! race with deletion — is a `PerFileFault` (spec §7): caught and swallowed
//! at file granularity. Callers get `None` and move on; nothing propagates.

use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::model::IndexedFile;
use crate::tokenizer::Tokenizer;

/// Run the indexing pipeline on a single absolute path.
///
/// Returns `None` if `file_filter` rejects the path, the path is not an
/// existing regular file, or reading/stat-ing it fails for any reason.
pub fn index_file(
    path: &Path,
    tokenizer: &dyn Tokenizer,
    file_filter: &dyn Fn(&Path) -> bool,
) -> Option<IndexedFile> {
    if !file_filter(path) {
        return None;
    }

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping file: stat failed");
            return None;
        }
    };

    if !metadata.is_file() {
        return None;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping file: read failed");
            return None;
        }
    };

    let tokens = tokenizer.tokenize(&contents);

    let last_modified_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    Some(IndexedFile {
        path: path.to_string_lossy().into_owned(),
        last_modified_ms,
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::DefaultTokenizer;
    use std::fs;

    fn accept_all(_: &Path) -> bool {
        true
    }

    #[test]
    fn indexes_regular_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello world hello").unwrap();

        let record = index_file(&path, &DefaultTokenizer, &accept_all).unwrap();
        assert_eq!(record.tokens.len(), 2);
        assert!(record.tokens.contains("hello"));
        assert!(record.tokens.contains("world"));
    }

    #[test]
    fn skips_file_rejected_by_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "data").unwrap();

        let record = index_file(&path, &DefaultTokenizer, &|p: &Path| {
            p.extension().is_some_and(|e| e == "txt")
        });
        assert!(record.is_none());
    }

    #[test]
    fn skips_nonexistent_path() {
        let missing = Path::new("/does/not/exist/at/all.txt");
        assert!(index_file(missing, &DefaultTokenizer, &accept_all).is_none());
    }

    #[test]
    fn skips_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(index_file(dir.path(), &DefaultTokenizer, &accept_all).is_none());
    }

    #[test]
    fn empty_file_indexes_with_no_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let record = index_file(&path, &DefaultTokenizer, &accept_all).unwrap();
        assert!(record.tokens.is_empty());
    }
}
