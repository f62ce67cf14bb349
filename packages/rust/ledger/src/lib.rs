//! Completion ledger: the sole authority on "already produced".
//!
//! The ledger is a single JSON document holding the set of item ids
//! whose assets were validated and durably persisted. It only grows:
//! persisting is always a set union with what is on disk, written as a
//! whole-file replace (write to a temp file, then rename) so a crash
//! mid-write can never lose previously recorded completions.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use insightforge_shared::{InsightForgeError, Result};

/// On-disk ledger document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    /// Sorted list of completed item ids.
    completed_ids: Vec<String>,
    /// Timestamp of the last persist.
    updated_at: DateTime<Utc>,
}

/// Load the set of completed item ids.
///
/// Fails soft: a missing or corrupt ledger file logs a warning and
/// yields the empty set. The run proceeds and the next persist replaces
/// the file with a valid document.
pub fn load(path: &Path) -> HashSet<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "ledger file not found, starting empty");
            return HashSet::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
            return HashSet::new();
        }
    };

    match serde_json::from_str::<LedgerFile>(&content) {
        Ok(file) => file.completed_ids.into_iter().collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ledger corrupt, starting empty");
            HashSet::new()
        }
    }
}

/// Merge `new_ids` into the ledger and write it back in full.
///
/// The on-disk set is re-read and unioned with both inputs, so ids
/// recorded by an earlier or concurrent writer are never erased. The
/// write is a whole-file replace via temp-file + rename. Returns the
/// merged cardinality.
pub fn merge_and_persist(
    path: &Path,
    existing: &HashSet<String>,
    new_ids: &HashSet<String>,
) -> Result<usize> {
    let mut merged = load(path);
    merged.extend(existing.iter().cloned());
    merged.extend(new_ids.iter().cloned());

    let mut ids: Vec<String> = merged.iter().cloned().collect();
    ids.sort();

    let file = LedgerFile {
        completed_ids: ids,
        updated_at: Utc::now(),
    };

    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| InsightForgeError::Ledger(format!("serialize failed: {e}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| InsightForgeError::io(parent, e))?;
        }
    }

    let temp = temp_path(path);
    std::fs::write(&temp, json).map_err(|e| InsightForgeError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| InsightForgeError::io(path, e))?;

    debug!(path = %path.display(), count = merged.len(), added = new_ids.len(), "ledger persisted");
    Ok(merged.len())
}

/// Sibling temp path for the atomic replace.
fn temp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ledger.json".into());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_ledger_path() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("if-ledger-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("ledger.json")
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_missing_file_is_empty() {
        let path = temp_ledger_path();
        assert!(load(&path).is_empty());
    }

    #[test]
    fn load_corrupt_file_is_empty() {
        let path = temp_ledger_path();
        std::fs::write(&path, "{not json at all").unwrap();
        assert!(load(&path).is_empty());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_then_load_roundtrip() {
        let path = temp_ledger_path();

        let count = merge_and_persist(&path, &set(&["11", "7"]), &set(&["42"])).unwrap();
        assert_eq!(count, 3);

        let loaded = load(&path);
        assert_eq!(loaded, set(&["7", "11", "42"]));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_is_a_union_never_an_overwrite() {
        let path = temp_ledger_path();

        merge_and_persist(&path, &HashSet::new(), &set(&["1", "2"])).unwrap();
        // A second writer that never saw ids 1/2 must not erase them.
        merge_and_persist(&path, &HashSet::new(), &set(&["3"])).unwrap();

        assert_eq!(load(&path), set(&["1", "2", "3"]));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_never_shrinks() {
        let path = temp_ledger_path();

        merge_and_persist(&path, &set(&["a", "b", "c"]), &HashSet::new()).unwrap();
        let before = load(&path);

        merge_and_persist(&path, &HashSet::new(), &set(&["d"])).unwrap();
        let after = load(&path);

        assert!(after.is_superset(&before));
        assert_eq!(after.len(), 4);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_replaces_corrupt_file() {
        let path = temp_ledger_path();
        std::fs::write(&path, "garbage").unwrap();

        merge_and_persist(&path, &HashSet::new(), &set(&["9"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["completed_ids"][0], "9");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_leaves_no_temp_file() {
        let path = temp_ledger_path();
        merge_and_persist(&path, &HashSet::new(), &set(&["1"])).unwrap();

        let dir = path.parent().unwrap();
        for entry in std::fs::read_dir(dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn ids_are_sorted_on_disk() {
        let path = temp_ledger_path();
        merge_and_persist(&path, &HashSet::new(), &set(&["30", "2", "100"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let file: serde_json::Value = serde_json::from_str(&content).unwrap();
        let ids: Vec<&str> = file["completed_ids"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["100", "2", "30"]); // lexicographic

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
