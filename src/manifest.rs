//! Manifest writer (C10).
//!
//! Every query, artifact build, index build, or evaluation run writes one
//! immutable JSON manifest recording what produced it: parameters, a
//! content-addressed `corpus_hash` where applicable, and (for query
//! manifests) the citation set. Manifests are the replay unit: same
//! inputs at a different time yield a different filename but identical
//! payload fields other than `created_at`.

use crate::error::{IoError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Computes the content-addressed hash of a processed corpus: SHA-256 of
/// every `*.jsonl` file under `processed_dir` (sorted by filename for an
/// order-insensitive result across files), concatenated as hex digests,
/// then SHA-256 of that concatenation.
///
/// # Errors
///
/// Returns an error if `processed_dir` cannot be read or a chunk file
/// cannot be read.
pub fn corpus_hash(processed_dir: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut paths: Vec<PathBuf> = std::fs::read_dir(processed_dir)
        .map_err(|e| IoError::ReadFailed {
            path: processed_dir.display().to_string(),
            reason: e.to_string(),
        })?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    paths.sort();

    let mut digests = String::new();
    for path in &paths {
        let bytes = std::fs::read(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        digests.push_str(&format!("{:x}", hasher.finalize()));
    }

    let mut final_hasher = Sha256::new();
    final_hasher.update(digests.as_bytes());
    Ok(format!("{:x}", final_hasher.finalize()))
}

/// Writes a manifest JSON document under `manifests_dir` and returns its
/// path. The filename is `{kind}_{yyyymmddThhmmssZ}.json`; the payload is
/// `payload` merged with `kind` and a UTC `created_at` timestamp.
///
/// # Errors
///
/// Returns an error if `manifests_dir` cannot be created or the manifest
/// cannot be serialized or written.
pub fn write(manifests_dir: &Path, kind: &str, payload: Value, now: chrono::DateTime<chrono::Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(manifests_dir).map_err(|e| IoError::DirectoryFailed {
        path: manifests_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let filename = format!("{kind}_{}.json", now.format("%Y%m%dT%H%M%SZ"));
    let path = manifests_dir.join(filename);

    let mut object = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };
    object.insert("kind".to_string(), Value::String(kind.to_string()));
    object.insert("created_at".to_string(), Value::String(now.to_rfc3339()));

    let text = serde_json::to_string_pretty(&Value::Object(object)).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    std::fs::write(&path, text).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn corpus_hash_is_order_insensitive_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jsonl"), b"second").unwrap();
        std::fs::write(dir.path().join("a.jsonl"), b"first").unwrap();

        let hash_ab = corpus_hash(dir.path()).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        std::fs::write(dir2.path().join("a.jsonl"), b"first").unwrap();
        std::fs::write(dir2.path().join("b.jsonl"), b"second").unwrap();
        let hash_reordered = corpus_hash(dir2.path()).unwrap();

        assert_eq!(hash_ab, hash_reordered);
    }

    #[test]
    fn corpus_hash_changes_when_file_contents_change() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jsonl"), b"original").unwrap();
        let before = corpus_hash(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.jsonl"), b"changed").unwrap();
        let after = corpus_hash(dir.path()).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn corpus_hash_ignores_non_jsonl_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jsonl"), b"content").unwrap();
        let with_one_file = corpus_hash(dir.path()).unwrap();

        std::fs::write(dir.path().join("notes.txt"), b"irrelevant").unwrap();
        let with_extra_file = corpus_hash(dir.path()).unwrap();

        assert_eq!(with_one_file, with_extra_file);
    }

    #[test]
    fn write_produces_expected_filename_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();

        let path = write(dir.path(), "query", json!({"question": "what is ICFR?"}), now).unwrap();

        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "query_20240305T123000Z.json");
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["kind"], "query");
        assert_eq!(parsed["question"], "what is ICFR?");
        assert!(parsed["created_at"].is_string());
    }
}
